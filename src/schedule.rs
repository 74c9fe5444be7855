use std::collections::BTreeSet;

use crate::{comm::Communicator, error::Result, obs::Observation};

const ROOT: usize = 0;

/// Agree on one ordered detector list across the process group.
///
/// Every rank passes the detectors it holds locally. The sets are gathered on
/// rank 0, merged and sorted there, and the result is broadcast back, so all
/// ranks walk the detectors in the same order even when they hold none of a
/// detector's samples.
pub fn agree_on_detectors(
    local: &BTreeSet<String>,
    comm: &dyn Communicator,
) -> Result<Vec<String>> {
    let gathered = comm.gather(local.iter().cloned().collect(), ROOT)?;
    let merged: Vec<String> = match gathered {
        Some(all) => all
            .into_iter()
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        None => Vec::new(),
    };
    Ok(comm.broadcast(merged, ROOT)?)
}

/// Detectors appearing in any local observation, optionally restricted to
/// `detectors`.
pub fn local_detector_set(
    data: &[Observation],
    detectors: Option<&[String]>,
) -> BTreeSet<String> {
    data.iter()
        .flat_map(|obs| obs.select_local_detectors(detectors))
        .collect()
}

//! Upstream detector pointing.
//!
//! The convolution operator needs one attitude quaternion per detector and
//! sample. Producing them is the job of a [`DetectorPointing`] operator that
//! runs before the angles are extracted.

use ndarray::{s, Array3};

use crate::{
    error::{ConviqtError, Result},
    obs::Observation,
    quat::{mult, Quat},
};

pub trait DetectorPointing: Send + Sync {
    /// Detector quaternion key written by [`DetectorPointing::apply`].
    fn quats(&self) -> &str;

    /// Fill the detector quaternions of `detectors` (all local detectors if
    /// `None`) in every observation.
    fn apply(&self, data: &mut [Observation], detectors: Option<&[String]>) -> Result<()>;
}

/// Detector attitude as the boresight attitude followed by the focal-plane
/// offset of the detector.
#[derive(Clone, Debug)]
pub struct BoresightPointing {
    /// Shared quaternion key of the boresight.
    pub boresight: String,
    pub quats: String,
}

impl BoresightPointing {
    pub fn new(boresight: &str, quats: &str) -> Self {
        Self {
            boresight: boresight.to_string(),
            quats: quats.to_string(),
        }
    }
}

impl Default for BoresightPointing {
    fn default() -> Self {
        Self::new("boresight_radec", "quats")
    }
}

impl DetectorPointing for BoresightPointing {
    fn quats(&self) -> &str {
        &self.quats
    }

    fn apply(&self, data: &mut [Observation], detectors: Option<&[String]>) -> Result<()> {
        for obs in data.iter_mut() {
            let dets = obs.select_local_detectors(detectors);
            if dets.is_empty() {
                continue;
            }
            let boresight = obs.shared_quat_field(&self.boresight)?.clone();
            let shape = (obs.local_detectors.len(), obs.n_samples, 4);
            let mut quats = match obs.det_quats.remove(&self.quats) {
                Some(q) if q.dim() == shape => q,
                _ => Array3::zeros(shape),
            };
            for det in &dets {
                let offset: Quat = obs.focalplane.quat(det)?;
                let idet = obs
                    .det_index(det)
                    .ok_or_else(|| ConviqtError::MissingDetector(det.clone()))?;
                let mut out = quats.slice_mut(s![idet, .., ..]);
                for (mut row, b) in out.rows_mut().into_iter().zip(boresight.rows()) {
                    let q = mult(&[b[0], b[1], b[2], b[3]], &offset);
                    row.iter_mut().zip(q.iter()).for_each(|(r, &x)| *r = x);
                }
            }
            obs.det_quats.insert(self.quats.clone(), quats);
        }
        Ok(())
    }
}

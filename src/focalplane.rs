use std::{collections::BTreeMap, fs::File, path::Path};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_yaml::from_reader;

use crate::{
    error::{ConviqtError, Result},
    quat::Quat,
};

/// Per-detector properties. Angles are in radians.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectorProps {
    #[serde(default)]
    pub psi_pol: Option<f64>,
    /// Deprecated spelling of `psi_pol`.
    #[serde(default)]
    pub pol_angle: Option<f64>,
    #[serde(default)]
    pub psi_uv: Option<f64>,
    #[serde(default)]
    pub pol_leakage: Option<f64>,
    /// Offset of the detector from the boresight.
    #[serde(default)]
    pub quat: Option<Quat>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Focalplane {
    pub detectors: BTreeMap<String, DetectorProps>,
}

impl Focalplane {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path)?;
        Ok(from_reader(f)?)
    }

    pub fn insert(&mut self, det: &str, props: DetectorProps) {
        self.detectors.insert(det.to_string(), props);
    }

    pub fn contains(&self, det: &str) -> bool {
        self.detectors.contains_key(det)
    }

    pub fn props(&self, det: &str) -> Result<&DetectorProps> {
        self.detectors
            .get(det)
            .ok_or_else(|| ConviqtError::MissingDetector(det.to_string()))
    }

    /// Polarization angle relative to the Pxx basis.
    pub fn psi_pol(&self, det: &str) -> Result<f64> {
        let props = self.props(det)?;
        if let Some(psi_pol) = props.psi_pol {
            Ok(psi_pol)
        } else if let Some(pol_angle) = props.pol_angle {
            warn!("{}: use psi_pol and psi_uv rather than pol_angle", det);
            Ok(pol_angle)
        } else {
            Err(ConviqtError::MissingFocalplaneKey {
                det: det.to_string(),
                key: "psi_pol",
            })
        }
    }

    /// Angle from the Dxx to the Pxx basis.
    pub fn psi_uv(&self, det: &str) -> Result<f64> {
        self.props(det)?
            .psi_uv
            .ok_or_else(|| ConviqtError::MissingFocalplaneKey {
                det: det.to_string(),
                key: "psi_uv",
            })
    }

    /// Polarization leakage, zero when the focalplane does not list one.
    pub fn epsilon(&self, det: &str) -> Result<f64> {
        Ok(self.props(det)?.pol_leakage.unwrap_or(0.0))
    }

    pub fn quat(&self, det: &str) -> Result<Quat> {
        self.props(det)?
            .quat
            .ok_or_else(|| ConviqtError::MissingFocalplaneKey {
                det: det.to_string(),
                key: "quat",
            })
    }
}

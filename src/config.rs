use std::{collections::BTreeMap, fs::File, path::Path};

use serde::{Deserialize, Serialize};
use serde_yaml::from_reader;

use crate::error::{ConviqtError, Result};

/// How the beam of a detector behaves in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeamModel {
    /// One beam, fixed relative to the detector.
    Static,
    /// Beam rotating with the polarization angle, expanded in I, Q and U
    /// axis beams.
    Weighted,
}

impl Default for BeamModel {
    fn default() -> Self {
        BeamModel::Static
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConviqtConfig {
    pub beam_model: BeamModel,
    pub det_flags: Option<String>,
    /// Kept signed so negative values from a config file are reported
    /// instead of failing to parse.
    pub det_flag_mask: i64,
    pub shared_flags: Option<String>,
    pub shared_flag_mask: i64,
    pub apply_flags: bool,
    pub view: Option<String>,
    pub det_data: String,
    pub calibrate: bool,
    pub dxx: bool,
    pub pol: bool,
    pub mc: Option<i64>,
    pub lmax: Option<usize>,
    pub beammmax: Option<usize>,
    pub order: usize,
    pub verbosity: u32,
    pub normalize_beam: bool,
    pub remove_monopole: bool,
    pub remove_dipole: bool,
    pub fwhm_arcmin: f64,
    pub sky_file: Option<String>,
    pub sky_file_dict: BTreeMap<String, String>,
    pub beam_file: Option<String>,
    pub beam_file_dict: BTreeMap<String, String>,
    pub hwp_angle: Option<String>,
}

impl Default for ConviqtConfig {
    fn default() -> Self {
        Self {
            beam_model: BeamModel::Static,
            det_flags: None,
            det_flag_mask: 0,
            shared_flags: None,
            shared_flag_mask: 0,
            apply_flags: false,
            view: None,
            det_data: "signal".to_string(),
            calibrate: true,
            dxx: true,
            pol: true,
            mc: None,
            lmax: None,
            beammmax: None,
            order: 13,
            verbosity: 0,
            normalize_beam: false,
            remove_monopole: false,
            remove_dipole: false,
            fwhm_arcmin: 4.0,
            sky_file: None,
            sky_file_dict: BTreeMap::new(),
            beam_file: None,
            beam_file_dict: BTreeMap::new(),
            hwp_angle: None,
        }
    }
}

fn check_mask(name: &str, mask: i64) -> Result<()> {
    if !(0..=u8::MAX as i64).contains(&mask) {
        return Err(ConviqtError::InvalidConfig(format!(
            "{} must be in 0..=255, got {}",
            name, mask
        )));
    }
    Ok(())
}

impl ConviqtConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path)?;
        Ok(from_reader(f)?)
    }

    pub fn validate(&self) -> Result<()> {
        check_mask("det_flag_mask", self.det_flag_mask)?;
        check_mask("shared_flag_mask", self.shared_flag_mask)?;
        if let Some(mc) = self.mc {
            if mc < 0 {
                return Err(ConviqtError::InvalidConfig(format!(
                    "mc cannot be negative, got {}",
                    mc
                )));
            }
        }
        if self.det_data.is_empty() {
            return Err(ConviqtError::InvalidConfig(
                "det_data key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validated masks are in range, so the casts below are exact.
    pub fn det_mask(&self) -> u8 {
        self.det_flag_mask as u8
    }

    pub fn shared_mask(&self) -> u8 {
        self.shared_flag_mask as u8
    }

    pub fn mc_index(&self) -> Option<u64> {
        self.mc.map(|mc| mc as u64)
    }
}

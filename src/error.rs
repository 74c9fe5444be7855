use thiserror::Error;

use crate::comm::CommError;

#[derive(Error, Debug)]
pub enum ConviqtError {
    #[error("convolution engine is not available")]
    EngineUnavailable,
    #[error("the convolution engine requires a process group")]
    NoCommunicator,
    #[error("detector pointing operator cannot be None")]
    NoDetectorPointing,
    #[error("focalplane does not include {0}")]
    MissingDetector(String),
    #[error("focalplane[{det}] does not include {key}")]
    MissingFocalplaneKey { det: String, key: &'static str },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("polarization leakage {epsilon} of {det} cannot be calibrated")]
    InvalidLeakage { det: String, epsilon: f64 },
    #[error("no sky file given for detector {0}")]
    MissingSkyFile(String),
    #[error("no beam file given for detector {0}")]
    MissingBeamFile(String),
    #[error("bad file name template: {0}")]
    Template(String),
    #[error("cannot derive axis beam names from {0}")]
    BeamFileName(String),
    #[error("observation {obs} has no view named {view}")]
    MissingView { obs: String, view: String },
    #[error("interval [{start}, {end}) of observation {obs} exceeds its {n_samples} samples")]
    BadInterval {
        obs: String,
        start: usize,
        end: usize,
        n_samples: usize,
    },
    #[error("observation {obs} has no field {key}")]
    MissingField { obs: String, key: String },
    #[error("field {key} of observation {obs} has shape {found:?}, expected {expected:?}")]
    BadShape {
        obs: String,
        key: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("length mismatch for {det}: storage holds {expected} samples, buffer has {actual}")]
    LengthMismatch {
        det: String,
        expected: usize,
        actual: usize,
    },
    #[error("convolution engine failed: {0}")]
    Engine(String),
    #[error("bad harmonic expansion: {0}")]
    Alm(String),
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConviqtError>;

pub mod accumulate;
pub mod alm;
pub mod calibrate;
pub mod comm;
pub mod config;
pub mod detpointing;
pub mod engine;
pub mod error;
pub mod filenames;
pub mod focalplane;
pub mod loader;
pub mod obs;
pub mod operator;
pub mod pointing;
pub mod quat;
pub mod schedule;
pub mod strategy;
pub mod utils;

pub use config::{BeamModel, ConviqtConfig};
pub use error::{ConviqtError, Result};
pub use operator::SimConviqt;

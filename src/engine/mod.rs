//! Interface to the beam-sky convolution engine.
//!
//! An engine is built once per (detector, beam component) pair and asked to
//! fill the signal column of a [`PointingBuffer`]. Building and convolving
//! are collective over the process group: every rank calls them for the
//! same detector, possibly with an empty buffer.

pub mod direct;

pub use direct::DirectSumFactory;

use crate::{
    alm::{BeamExpansion, SkyExpansion},
    comm::Communicator,
    error::Result,
    pointing::PointingBuffer,
};

/// Detector as seen by the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineDetector {
    pub name: String,
    pub epsilon: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvolverParams {
    pub pol: bool,
    pub lmax: usize,
    pub mmax: usize,
    /// Expert-mode interpolation order.
    pub order: usize,
    pub verbosity: u32,
}

pub trait Convolver {
    fn convolve(&mut self, pnt: &mut PointingBuffer) -> Result<()>;
}

pub trait ConvolverFactory: Send + Sync {
    /// Whether the engine can run in this environment.
    fn available(&self) -> bool;

    fn create<'a>(
        &'a self,
        sky: &'a SkyExpansion,
        beam: &'a BeamExpansion,
        detector: &EngineDetector,
        params: &ConvolverParams,
        comm: &'a dyn Communicator,
    ) -> Result<Box<dyn Convolver + 'a>>;
}

//! Static and weighted convolution of one detector.

use crate::{
    alm::{BeamExpansion, SkyExpansion},
    comm::Communicator,
    engine::{ConvolverFactory, ConvolverParams, EngineDetector},
    error::{ConviqtError, Result},
    pointing::{DetPointing, PointingBuffer},
};

/// Axis beams of the weighted model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisBeam {
    I,
    Q,
    U,
}

impl AxisBeam {
    pub const ALL: [AxisBeam; 3] = [AxisBeam::I, AxisBeam::Q, AxisBeam::U];

    pub fn index(self) -> usize {
        match self {
            AxisBeam::I => 0,
            AxisBeam::Q => 1,
            AxisBeam::U => 2,
        }
    }
}

/// Everything an engine call needs besides the expansions and pointing.
pub struct Convolution<'a> {
    pub factory: &'a dyn ConvolverFactory,
    pub comm: &'a dyn Communicator,
    pub detector: EngineDetector,
    pub pol: bool,
    /// Overrides of the expansion resolutions.
    pub lmax: Option<usize>,
    pub mmax: Option<usize>,
    pub order: usize,
    pub verbosity: u32,
}

impl<'a> Convolution<'a> {
    pub fn params(&self, sky: &SkyExpansion, beam: &BeamExpansion) -> ConvolverParams {
        ConvolverParams {
            pol: self.pol,
            lmax: self.lmax.unwrap_or_else(|| sky.lmax()),
            mmax: self.mmax.unwrap_or_else(|| beam.mmax()),
            order: self.order,
            verbosity: self.verbosity,
        }
    }

    /// One engine call over the whole pointing stream.
    pub fn convolve_component(
        &self,
        sky: &SkyExpansion,
        beam: &BeamExpansion,
        pointing: &DetPointing,
    ) -> Result<Vec<f64>> {
        let mut pnt = PointingBuffer::pack(pointing);
        let params = self.params(sky, beam);
        {
            let mut convolver = self
                .factory
                .create(sky, beam, &self.detector, &params, self.comm)?;
            convolver.convolve(&mut pnt)?;
        }
        if pnt.nrow() == 0 {
            return Ok(Vec::new());
        }
        Ok(pnt.signal())
    }

    pub fn convolve_static(
        &self,
        sky: &SkyExpansion,
        beam: &BeamExpansion,
        pointing: &DetPointing,
    ) -> Result<Vec<f64>> {
        self.convolve_component(sky, beam, pointing)
    }

    /// Convolve with the I, Q and U axis beams in turn and recombine with
    /// the polarization angle.
    ///
    /// Each beam is requested from `load_beam` right before its engine call
    /// and dropped right after. Returns the combined signal and whether the
    /// I beam is normalized.
    pub fn convolve_weighted<F>(
        &self,
        sky: &SkyExpansion,
        pointing: &DetPointing,
        mut load_beam: F,
    ) -> Result<(Vec<f64>, bool)>
    where
        F: FnMut(AxisBeam) -> Result<BeamExpansion>,
    {
        let mut normalized = false;
        let mut signals: [Vec<f64>; 3] = Default::default();
        for axis in AxisBeam::ALL {
            let beam = load_beam(axis)?;
            if axis == AxisBeam::I {
                normalized = beam.normalized();
            }
            signals[axis.index()] = self.convolve_component(sky, &beam, pointing)?;
        }
        let [i, q, u] = signals;
        let combined = combine_axis_signals(&self.detector.name, i, &q, &u, &pointing.psi_pol)?;
        Ok((combined, normalized))
    }
}

/// `I + cos(2 psi_pol) Q + sin(2 psi_pol) U`, sample by sample.
pub fn combine_axis_signals(
    det: &str,
    mut i: Vec<f64>,
    q: &[f64],
    u: &[f64],
    psi_pol: &[f64],
) -> Result<Vec<f64>> {
    for other in [q.len(), u.len(), psi_pol.len()] {
        if other != i.len() {
            return Err(ConviqtError::LengthMismatch {
                det: det.to_string(),
                expected: i.len(),
                actual: other,
            });
        }
    }
    for (k, s) in i.iter_mut().enumerate() {
        let (sin2, cos2) = (2.0 * psi_pol[k]).sin_cos();
        *s += cos2 * q[k] + sin2 * u[k];
    }
    Ok(i)
}

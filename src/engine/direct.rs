//! Direct harmonic summation engine.
//!
//! Evaluates the intensity sky smoothed by the azimuthally symmetric part of
//! the beam (`b_l0`) at each pointing. Cost grows as `lmax^2` per sample, so
//! this is meant for low resolution runs and for checking the pipeline.
//! Polarization terms and the position angle are not used.

use std::f64::consts::PI;

use log::debug;
use num::complex::Complex;

use super::{Convolver, ConvolverFactory, ConvolverParams, EngineDetector};
use crate::{
    alm::{Alm, BeamExpansion, SkyExpansion},
    comm::Communicator,
    error::{ConviqtError, Result},
    pointing::{PointingBuffer, PHI, SIGNAL, THETA},
};

#[derive(Clone, Copy, Debug, Default)]
pub struct DirectSumFactory;

impl ConvolverFactory for DirectSumFactory {
    fn available(&self) -> bool {
        true
    }

    fn create<'a>(
        &'a self,
        sky: &'a SkyExpansion,
        beam: &'a BeamExpansion,
        detector: &EngineDetector,
        params: &ConvolverParams,
        _comm: &'a dyn Communicator,
    ) -> Result<Box<dyn Convolver + 'a>> {
        let lmax = params.lmax.min(sky.lmax()).min(beam.lmax());
        if params.pol {
            debug!(
                "{}: direct summation ignores polarization terms",
                detector.name
            );
        }
        Ok(Box::new(DirectSumConvolver {
            sky: sky.intensity(),
            window: beam_window(beam.intensity(), lmax),
            lmax,
        }))
    }
}

/// `sqrt(4π / (2l + 1)) b_l0`.
pub fn beam_window(blm: &Alm, lmax: usize) -> Vec<f64> {
    (0..=lmax)
        .map(|l| (4.0 * PI / (2 * l + 1) as f64).sqrt() * blm.get(l, 0).re)
        .collect()
}

pub struct DirectSumConvolver<'a> {
    sky: &'a Alm,
    window: Vec<f64>,
    lmax: usize,
}

impl<'a> DirectSumConvolver<'a> {
    /// Smoothed sky at one direction.
    pub fn evaluate(&self, theta: f64, phi: f64) -> f64 {
        let (s, x) = theta.sin_cos();
        let mmax = self.sky.mmax().min(self.lmax);
        let mut pmm = (1.0 / (4.0 * PI)).sqrt();
        let mut total = 0.0;
        for m in 0..=mmax {
            if m > 0 {
                pmm *= -((2 * m + 1) as f64 / (2 * m) as f64).sqrt() * s;
            }
            let mut acc = self.sky.get(m, m) * (self.window[m] * pmm);
            let mut p2 = 0.0;
            let mut p1 = pmm;
            for l in (m + 1)..=self.lmax {
                let lf = l as f64;
                let mf = m as f64;
                let p = if l == m + 1 {
                    (2.0 * mf + 3.0).sqrt() * x * pmm
                } else {
                    let a = ((4.0 * lf * lf - 1.0) / (lf * lf - mf * mf)).sqrt();
                    let b = (((lf - 1.0) * (lf - 1.0) - mf * mf)
                        / (4.0 * (lf - 1.0) * (lf - 1.0) - 1.0))
                        .sqrt();
                    a * (x * p1 - b * p2)
                };
                acc += self.sky.get(l, m) * (self.window[l] * p);
                p2 = p1;
                p1 = p;
            }
            let term = (acc * Complex::from_polar(1.0, m as f64 * phi)).re;
            total += if m == 0 { term } else { 2.0 * term };
        }
        total
    }
}

impl<'a> Convolver for DirectSumConvolver<'a> {
    fn convolve(&mut self, pnt: &mut PointingBuffer) -> Result<()> {
        let mut data = pnt.data_mut();
        for (i, mut row) in data.rows_mut().into_iter().enumerate() {
            let (theta, phi) = (row[THETA], row[PHI]);
            if !theta.is_finite() || !phi.is_finite() {
                return Err(ConviqtError::Engine(format!(
                    "non-finite pointing at sample {}",
                    i
                )));
            }
            row[SIGNAL] = self.evaluate(theta, phi);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{comm::SelfComm, pointing::DetPointing};
    use approx::assert_abs_diff_eq;

    fn unit_window_beam(lmax: usize) -> BeamExpansion {
        let mut b = Alm::zeros(lmax, 0).unwrap();
        for l in 0..=lmax {
            b.set(l, 0, Complex::new(((2 * l + 1) as f64 / (4.0 * PI)).sqrt(), 0.0));
        }
        BeamExpansion::new(vec![b], true).unwrap()
    }

    fn params(lmax: usize) -> ConvolverParams {
        ConvolverParams {
            pol: false,
            lmax,
            mmax: 0,
            order: 13,
            verbosity: 0,
        }
    }

    #[test]
    fn low_multipoles_match_closed_form() {
        // T = 2 + 0.5 cos(theta) + 0.3 sin(theta) cos(phi)
        let mut t = Alm::zeros(3, 3).unwrap();
        t.set(0, 0, Complex::new(2.0 * (4.0 * PI).sqrt(), 0.0));
        t.set(1, 0, Complex::new(0.5 * (4.0 * PI / 3.0).sqrt(), 0.0));
        t.set(1, 1, Complex::new(-0.3 * (2.0 * PI / 3.0).sqrt(), 0.0));
        let sky = SkyExpansion::new(vec![t]).unwrap();
        let beam = unit_window_beam(3);
        let det = EngineDetector {
            name: "d".to_string(),
            epsilon: 0.0,
        };
        let factory = DirectSumFactory;
        let comm = SelfComm;
        let mut conv = factory
            .create(&sky, &beam, &det, &params(3), &comm)
            .unwrap();

        let pointing = DetPointing {
            theta: vec![0.3, 1.2, 2.8],
            phi: vec![0.0, 1.0, 4.0],
            psi: vec![0.0; 3],
            psi_pol: vec![0.0; 3],
        };
        let mut pnt = PointingBuffer::pack(&pointing);
        conv.convolve(&mut pnt).unwrap();
        for (i, s) in pnt.signal().iter().enumerate() {
            let (th, ph) = (pointing.theta[i], pointing.phi[i]);
            let expected = 2.0 + 0.5 * th.cos() + 0.3 * th.sin() * ph.cos();
            assert_abs_diff_eq!(*s, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn quadrupole_recurrence() {
        // Y_20 = sqrt(5 / 16π) (3 cos^2 - 1), Y_22 = sqrt(15 / 32π) sin^2 e^{2iφ}
        let mut t = Alm::zeros(2, 2).unwrap();
        t.set(2, 0, Complex::new(1.0, 0.0));
        t.set(2, 2, Complex::new(0.0, 1.0));
        let conv = DirectSumConvolver {
            sky: &t,
            window: vec![1.0; 3],
            lmax: 2,
        };
        let (th, ph) = (0.7_f64, 0.4_f64);
        let y20 = (5.0 / (16.0 * PI)).sqrt() * (3.0 * th.cos().powi(2) - 1.0);
        let y22 = (15.0 / (32.0 * PI)).sqrt() * th.sin().powi(2);
        let expected = y20 + 2.0 * (Complex::new(0.0, y22) * Complex::from_polar(1.0, 2.0 * ph)).re;
        assert_abs_diff_eq!(conv.evaluate(th, ph), expected, epsilon = 1e-12);
    }

    #[test]
    fn bad_pointing_is_an_engine_error() {
        let t = Alm::zeros(1, 1).unwrap();
        let mut conv = DirectSumConvolver {
            sky: &t,
            window: vec![1.0; 2],
            lmax: 1,
        };
        let pointing = DetPointing {
            theta: vec![0.1, f64::NAN],
            phi: vec![0.0; 2],
            psi: vec![0.0; 2],
            psi_pol: vec![0.0; 2],
        };
        let mut pnt = PointingBuffer::pack(&pointing);
        assert!(matches!(
            conv.convolve(&mut pnt),
            Err(ConviqtError::Engine(_))
        ));
    }

    #[test]
    fn window_is_truncated_to_the_smallest_lmax() {
        let beam = unit_window_beam(6);
        let w = beam_window(beam.intensity(), 2);
        assert_eq!(w.len(), 3);
        for x in w {
            assert_abs_diff_eq!(x, 1.0, epsilon = 1e-14);
        }
    }
}

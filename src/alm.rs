//! Spherical-harmonic coefficient sets for the sky and the beam.
//!
//! Coefficients are stored m-major: all `l` for `m = 0`, then all `l >= 1`
//! for `m = 1`, and so on up to `mmax`. Only `m >= 0` is kept, the expanded
//! fields are real.

use std::f64::consts::PI;

use ndarray::Array1;
use num::complex::Complex;

use crate::error::{ConviqtError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct Alm {
    lmax: usize,
    mmax: usize,
    coeffs: Array1<Complex<f64>>,
}

pub fn alm_size(lmax: usize, mmax: usize) -> usize {
    mmax * (2 * lmax + 1 - mmax) / 2 + lmax + 1
}

impl Alm {
    pub fn zeros(lmax: usize, mmax: usize) -> Result<Self> {
        if mmax > lmax {
            return Err(ConviqtError::Alm(format!("mmax {} > lmax {}", mmax, lmax)));
        }
        Ok(Self {
            lmax,
            mmax,
            coeffs: Array1::zeros(alm_size(lmax, mmax)),
        })
    }

    pub fn from_coeffs(lmax: usize, mmax: usize, coeffs: Vec<Complex<f64>>) -> Result<Self> {
        let mut alm = Self::zeros(lmax, mmax)?;
        if coeffs.len() != alm.coeffs.len() {
            return Err(ConviqtError::Alm(format!(
                "{} coefficients given, (lmax, mmax) = ({}, {}) needs {}",
                coeffs.len(),
                lmax,
                mmax,
                alm.coeffs.len()
            )));
        }
        alm.coeffs = Array1::from(coeffs);
        Ok(alm)
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    pub fn mmax(&self) -> usize {
        self.mmax
    }

    pub fn coeffs(&self) -> &Array1<Complex<f64>> {
        &self.coeffs
    }

    pub fn index(&self, l: usize, m: usize) -> usize {
        m * (2 * self.lmax + 1 - m) / 2 + l
    }

    pub fn get(&self, l: usize, m: usize) -> Complex<f64> {
        if m > self.mmax || m > l || l > self.lmax {
            Complex::new(0.0, 0.0)
        } else {
            self.coeffs[self.index(l, m)]
        }
    }

    pub fn set(&mut self, l: usize, m: usize, value: Complex<f64>) {
        if m <= self.mmax && m <= l && l <= self.lmax {
            let i = self.index(l, m);
            self.coeffs[i] = value;
        }
    }

    /// Copy of the expansion limited to `lmax`/`mmax` (each capped at the
    /// stored resolution).
    pub fn truncated(&self, lmax: usize, mmax: usize) -> Self {
        let lmax = lmax.min(self.lmax);
        let mmax = mmax.min(self.mmax).min(lmax);
        let mut out = Self {
            lmax,
            mmax,
            coeffs: Array1::zeros(alm_size(lmax, mmax)),
        };
        for m in 0..=mmax {
            for l in m..=lmax {
                out.set(l, m, self.get(l, m));
            }
        }
        out
    }

    /// Multiply every `a_lm` by `window[l]`.
    pub fn scale_by_ell(&mut self, window: &[f64]) {
        for m in 0..=self.mmax {
            for l in m..=self.lmax {
                let i = self.index(l, m);
                self.coeffs[i] *= window[l];
            }
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.coeffs.iter_mut().for_each(|c| *c *= factor);
    }
}

/// Gaussian beam window for `fwhm` radians: `[intensity, polarization]`.
pub fn gauss_window(lmax: usize, fwhm: f64) -> (Vec<f64>, Vec<f64>) {
    let sigma = fwhm / (8.0 * 2_f64.ln()).sqrt();
    let s2 = sigma * sigma;
    (0..=lmax)
        .map(|l| {
            let ll = (l * (l + 1)) as f64;
            ((-0.5 * ll * s2).exp(), (-0.5 * ll * s2 + 2.0 * s2).exp())
        })
        .unzip()
}

/// Sky expansion: `[T]` or `[T, E, B]`.
#[derive(Clone, Debug)]
pub struct SkyExpansion {
    pub components: Vec<Alm>,
    pub pol: bool,
    /// FWHM in arcmin of the beam removed by [`SkyExpansion::deconvolve`].
    pub deconvolved_fwhm: Option<f64>,
}

impl SkyExpansion {
    pub fn new(components: Vec<Alm>) -> Result<Self> {
        check_components(&components)?;
        let pol = components.len() == 3;
        Ok(Self {
            components,
            pol,
            deconvolved_fwhm: None,
        })
    }

    pub fn lmax(&self) -> usize {
        self.components[0].lmax()
    }

    pub fn intensity(&self) -> &Alm {
        &self.components[0]
    }

    pub fn remove_monopole(&mut self) {
        self.components[0].set(0, 0, Complex::new(0.0, 0.0));
    }

    pub fn remove_dipole(&mut self) {
        self.components[0].set(1, 0, Complex::new(0.0, 0.0));
        self.components[0].set(1, 1, Complex::new(0.0, 0.0));
    }

    /// Divide out a symmetric gaussian beam of `fwhm_arcmin` already present
    /// in the coefficients.
    pub fn deconvolve(&mut self, fwhm_arcmin: f64) {
        if fwhm_arcmin <= 0.0 {
            return;
        }
        let (wt, wp) = gauss_window(self.lmax(), (fwhm_arcmin / 60.0).to_radians());
        let inv_t: Vec<f64> = wt.iter().map(|w| 1.0 / w).collect();
        let inv_p: Vec<f64> = wp.iter().map(|w| 1.0 / w).collect();
        for (i, comp) in self.components.iter_mut().enumerate() {
            comp.scale_by_ell(if i == 0 { &inv_t } else { &inv_p });
        }
        self.deconvolved_fwhm = Some(fwhm_arcmin);
    }
}

/// Beam expansion: `[T]` or `[T, E, B]`.
#[derive(Clone, Debug)]
pub struct BeamExpansion {
    pub components: Vec<Alm>,
    pub pol: bool,
    normalized: bool,
}

impl BeamExpansion {
    pub fn new(components: Vec<Alm>, normalized: bool) -> Result<Self> {
        check_components(&components)?;
        let pol = components.len() == 3;
        Ok(Self {
            components,
            pol,
            normalized,
        })
    }

    pub fn lmax(&self) -> usize {
        self.components[0].lmax()
    }

    pub fn mmax(&self) -> usize {
        self.components[0].mmax()
    }

    pub fn intensity(&self) -> &Alm {
        &self.components[0]
    }

    /// True once the beam has unit response to a temperature monopole.
    pub fn normalized(&self) -> bool {
        self.normalized
    }

    /// Rescale all components to unit response to a temperature monopole.
    pub fn normalize(&mut self) -> Result<()> {
        let b00 = self.components[0].get(0, 0).re;
        if b00 == 0.0 {
            return Err(ConviqtError::Alm(
                "beam has no monopole and cannot be normalized".to_string(),
            ));
        }
        let factor = 1.0 / ((4.0 * PI).sqrt() * b00);
        self.components.iter_mut().for_each(|c| c.scale(factor));
        self.normalized = true;
        Ok(())
    }
}

fn check_components(components: &[Alm]) -> Result<()> {
    if components.len() != 1 && components.len() != 3 {
        return Err(ConviqtError::Alm(format!(
            "expected 1 or 3 components, got {}",
            components.len()
        )));
    }
    let (lmax, mmax) = (components[0].lmax(), components[0].mmax());
    if components.iter().any(|c| c.lmax() != lmax || c.mmax() != mmax) {
        return Err(ConviqtError::Alm(
            "components differ in resolution".to_string(),
        ));
    }
    Ok(())
}

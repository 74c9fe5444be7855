//! Loading of sky and beam expansions.

use std::{
    fs::File,
    path::Path,
};

use log::{debug, warn};
use num::complex::Complex;
use serde::{Deserialize, Serialize};
use serde_yaml::{from_reader, to_writer};

use crate::{
    alm::{Alm, BeamExpansion, SkyExpansion},
    comm::Communicator,
    error::{ConviqtError, Result},
};

pub trait AlmLoader: Send + Sync {
    /// Load a sky expansion truncated to `lmax` (file resolution if `None`)
    /// with the gaussian beam of `fwhm_arcmin` divided out.
    fn load_sky(
        &self,
        path: &Path,
        lmax: Option<usize>,
        pol: bool,
        fwhm_arcmin: f64,
        comm: &dyn Communicator,
    ) -> Result<SkyExpansion>;

    fn load_beam(
        &self,
        path: &Path,
        lmax: Option<usize>,
        mmax: Option<usize>,
        pol: bool,
        comm: &dyn Communicator,
    ) -> Result<BeamExpansion>;
}

/// Coefficient document: one list of `[re, im]` pairs per Stokes component,
/// m-major.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlmFile {
    pub lmax: usize,
    pub mmax: usize,
    #[serde(default)]
    pub normalized: bool,
    pub components: Vec<Vec<[f64; 2]>>,
}

impl AlmFile {
    pub fn from_alms(alms: &[Alm], normalized: bool) -> Self {
        let (lmax, mmax) = alms.first().map_or((0, 0), |a| (a.lmax(), a.mmax()));
        AlmFile {
            lmax,
            mmax,
            normalized,
            components: alms
                .iter()
                .map(|a| a.coeffs().iter().map(|c| [c.re, c.im]).collect())
                .collect(),
        }
    }

    pub fn to_alms(&self) -> Result<Vec<Alm>> {
        self.components
            .iter()
            .map(|comp| {
                let coeffs = comp.iter().map(|&[re, im]| Complex::new(re, im)).collect();
                Alm::from_coeffs(self.lmax, self.mmax, coeffs)
            })
            .collect()
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path)?;
        Ok(from_reader(f)?)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut f = File::create(path)?;
        to_writer(&mut f, self)?;
        Ok(())
    }
}

fn select_components(
    path: &Path,
    mut alms: Vec<Alm>,
    pol: bool,
    lmax: usize,
    mmax: usize,
) -> Result<Vec<Alm>> {
    if alms.is_empty() {
        return Err(ConviqtError::Alm(format!("{} holds no components", path.display())));
    }
    if pol && alms.len() == 1 {
        warn!("{} has no polarization, padding E and B with zeros", path.display());
        let zero = Alm::zeros(lmax, mmax)?;
        alms.push(zero.clone());
        alms.push(zero);
    }
    if !pol {
        alms.truncate(1);
    }
    Ok(alms.iter().map(|a| a.truncated(lmax, mmax)).collect())
}

/// Reads [`AlmFile`] documents. Every rank reads the file itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct YamlAlmLoader;

impl AlmLoader for YamlAlmLoader {
    fn load_sky(
        &self,
        path: &Path,
        lmax: Option<usize>,
        pol: bool,
        fwhm_arcmin: f64,
        _comm: &dyn Communicator,
    ) -> Result<SkyExpansion> {
        let file = AlmFile::read(path)?;
        let lmax = lmax.unwrap_or(file.lmax).min(file.lmax);
        let alms = select_components(path, file.to_alms()?, pol, lmax, lmax)?;
        let mut sky = SkyExpansion::new(alms)?;
        sky.deconvolve(fwhm_arcmin);
        debug!("loaded sky {} with lmax = {}", path.display(), sky.lmax());
        Ok(sky)
    }

    fn load_beam(
        &self,
        path: &Path,
        lmax: Option<usize>,
        mmax: Option<usize>,
        pol: bool,
        _comm: &dyn Communicator,
    ) -> Result<BeamExpansion> {
        let file = AlmFile::read(path)?;
        let lmax = lmax.unwrap_or(file.lmax).min(file.lmax);
        let mmax = mmax.unwrap_or(file.mmax).min(file.mmax).min(lmax);
        let alms = select_components(path, file.to_alms()?, pol, lmax, mmax)?;
        let beam = BeamExpansion::new(alms, file.normalized)?;
        debug!(
            "loaded beam {} with lmax = {}, mmax = {}",
            path.display(),
            beam.lmax(),
            beam.mmax()
        );
        Ok(beam)
    }
}

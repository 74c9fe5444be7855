//! In-memory observation container.
//!
//! An observation owns a contiguous block of samples for a set of local
//! detectors. Shared streams have one value per sample, detector streams are
//! stored detector-major as `(n_det, n_samples)` (or `(n_det, n_samples, 4)`
//! for quaternions) in the order of `local_detectors`.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayViewMut1, Axis};

use crate::{
    error::{ConviqtError, Result},
    focalplane::Focalplane,
};

/// Half-open sample range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}

impl Interval {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct Observation {
    pub name: String,
    pub n_samples: usize,
    pub local_detectors: Vec<String>,
    pub focalplane: Focalplane,
    /// Named interval lists ("views").
    pub intervals: BTreeMap<String, Vec<Interval>>,
    pub shared: BTreeMap<String, Array1<f64>>,
    pub shared_flags: BTreeMap<String, Array1<u8>>,
    /// Shared quaternion streams, `(n_samples, 4)`.
    pub shared_quats: BTreeMap<String, Array2<f64>>,
    pub detdata: BTreeMap<String, Array2<f64>>,
    pub det_flags: BTreeMap<String, Array2<u8>>,
    pub det_quats: BTreeMap<String, Array3<f64>>,
}

impl Observation {
    pub fn new(
        name: &str,
        n_samples: usize,
        local_detectors: Vec<String>,
        focalplane: Focalplane,
    ) -> Self {
        Self {
            name: name.to_string(),
            n_samples,
            local_detectors,
            focalplane,
            ..Default::default()
        }
    }

    pub fn det_index(&self, det: &str) -> Option<usize> {
        self.local_detectors.iter().position(|d| d == det)
    }

    pub fn has_detector(&self, det: &str) -> bool {
        self.det_index(det).is_some()
    }

    /// Local detectors, restricted to `detectors` if given. Order follows
    /// `local_detectors`.
    pub fn select_local_detectors(&self, detectors: Option<&[String]>) -> Vec<String> {
        match detectors {
            None => self.local_detectors.clone(),
            Some(sel) => self
                .local_detectors
                .iter()
                .filter(|d| sel.contains(*d))
                .cloned()
                .collect(),
        }
    }

    /// Create a zero-filled detector data field if it does not exist yet.
    /// An existing field must already be `(n_det, n_samples)`.
    pub fn ensure_detdata(&mut self, key: &str) -> Result<()> {
        let shape = (self.local_detectors.len(), self.n_samples);
        match self.detdata.get(key) {
            Some(data) => self.check_shape(key, data.shape(), &[shape.0, shape.1]),
            None => {
                self.detdata.insert(key.to_string(), Array2::zeros(shape));
                Ok(())
            }
        }
    }

    /// The interval list named `view`, or the whole observation when `None`.
    pub fn view(&self, view: Option<&str>) -> Result<Vec<Interval>> {
        match view {
            None => Ok(vec![Interval::new(0, self.n_samples)]),
            Some(name) => {
                let intervals =
                    self.intervals
                        .get(name)
                        .ok_or_else(|| ConviqtError::MissingView {
                            obs: self.name.clone(),
                            view: name.to_string(),
                        })?;
                if let Some(bad) = intervals
                    .iter()
                    .find(|i| i.start > i.end || i.end > self.n_samples)
                {
                    return Err(ConviqtError::BadInterval {
                        obs: self.name.clone(),
                        start: bad.start,
                        end: bad.end,
                        n_samples: self.n_samples,
                    });
                }
                Ok(intervals.clone())
            }
        }
    }

    fn missing(&self, key: &str) -> ConviqtError {
        ConviqtError::MissingField {
            obs: self.name.clone(),
            key: key.to_string(),
        }
    }

    fn require_index(&self, det: &str) -> Result<usize> {
        self.det_index(det).ok_or_else(|| self.missing(det))
    }

    fn check_shape(&self, key: &str, found: &[usize], expected: &[usize]) -> Result<()> {
        if found == expected {
            Ok(())
        } else {
            Err(ConviqtError::BadShape {
                obs: self.name.clone(),
                key: key.to_string(),
                expected: expected.to_vec(),
                found: found.to_vec(),
            })
        }
    }

    fn det_shape(&self) -> [usize; 2] {
        [self.local_detectors.len(), self.n_samples]
    }

    pub fn shared_field(&self, key: &str) -> Result<&Array1<f64>> {
        let field = self.shared.get(key).ok_or_else(|| self.missing(key))?;
        self.check_shape(key, field.shape(), &[self.n_samples])?;
        Ok(field)
    }

    pub fn shared_flag_field(&self, key: &str) -> Result<&Array1<u8>> {
        let field = self.shared_flags.get(key).ok_or_else(|| self.missing(key))?;
        self.check_shape(key, field.shape(), &[self.n_samples])?;
        Ok(field)
    }

    /// Shared quaternions, `(n_samples, 4)`.
    pub fn shared_quat_field(&self, key: &str) -> Result<&Array2<f64>> {
        let field = self.shared_quats.get(key).ok_or_else(|| self.missing(key))?;
        self.check_shape(key, field.shape(), &[self.n_samples, 4])?;
        Ok(field)
    }

    pub fn det_flag_field(&self, key: &str, det: &str) -> Result<ArrayView1<u8>> {
        let idet = self.require_index(det)?;
        let flags = self.det_flags.get(key).ok_or_else(|| self.missing(key))?;
        self.check_shape(key, flags.shape(), &self.det_shape())?;
        Ok(flags.row(idet))
    }

    pub fn det_quat_field(&self, key: &str, det: &str) -> Result<ArrayView2<f64>> {
        let idet = self.require_index(det)?;
        let quats = self.det_quats.get(key).ok_or_else(|| self.missing(key))?;
        let [n_det, n_samples] = self.det_shape();
        self.check_shape(key, quats.shape(), &[n_det, n_samples, 4])?;
        Ok(quats.index_axis(Axis(0), idet))
    }

    pub fn detdata_field(&self, key: &str, det: &str) -> Result<ArrayView1<f64>> {
        let idet = self.require_index(det)?;
        let data = self.detdata.get(key).ok_or_else(|| self.missing(key))?;
        self.check_shape(key, data.shape(), &self.det_shape())?;
        Ok(data.row(idet))
    }

    pub fn detdata_field_mut(
        &mut self,
        key: &str,
        det: &str,
    ) -> Result<ArrayViewMut1<f64>> {
        let idet = self.require_index(det)?;
        let data = self.detdata.get(key).ok_or_else(|| self.missing(key))?;
        self.check_shape(key, data.shape(), &self.det_shape())?;
        let obs = self.name.clone();
        let data = self
            .detdata
            .get_mut(key)
            .ok_or_else(|| ConviqtError::MissingField {
                obs,
                key: key.to_string(),
            })?;
        Ok(data.row_mut(idet))
    }
}

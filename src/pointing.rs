//! Detector pointing in the beam frame.
//!
//! For one detector, walks every local observation and every interval of the
//! selected view, converts the attitude quaternions to colatitude, longitude
//! and position angle, and concatenates the results. The traversal order
//! (observation, interval, sample) is the one the accumulator uses to write
//! the convolved signal back.

use ndarray::{s, Array2, ArrayView1, ArrayView2, ArrayViewMut2};

use crate::{
    error::Result,
    focalplane::Focalplane,
    obs::Observation,
    quat::{to_angles, NULL_QUAT},
};

/// Which observation fields feed the pointing extraction.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointingOptions<'a> {
    pub view: Option<&'a str>,
    /// Detector quaternion key.
    pub quats: &'a str,
    /// Shared flag key and mask. `None` disables shared flagging.
    pub shared_flags: Option<(&'a str, u8)>,
    /// Detector flag key and mask. `None` disables detector flagging.
    pub det_flags: Option<(&'a str, u8)>,
    pub dxx: bool,
    pub hwp_angle: Option<&'a str>,
}

/// Concatenated pointing of one detector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetPointing {
    pub theta: Vec<f64>,
    pub phi: Vec<f64>,
    pub psi: Vec<f64>,
    /// Polarization angle per sample, including the HWP modulation.
    pub psi_pol: Vec<f64>,
}

impl DetPointing {
    pub fn len(&self) -> usize {
        self.theta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.theta.is_empty()
    }
}

/// Combine flag streams: each is AND-ed with its mask, the results OR-ed.
/// Returns `None` when no stream is given.
pub fn flag_mask(
    shared: Option<(ArrayView1<u8>, u8)>,
    det: Option<(ArrayView1<u8>, u8)>,
) -> Option<Vec<u8>> {
    let shared: Option<Vec<u8>> = shared.map(|(f, mask)| f.iter().map(|&x| x & mask).collect());
    let det: Option<Vec<u8>> = det.map(|(f, mask)| f.iter().map(|&x| x & mask).collect());
    match (shared, det) {
        (Some(a), Some(b)) => Some(a.iter().zip(b.iter()).map(|(&x, &y)| x | y).collect()),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Polarization angle of `det` in the beam frame: `psi_pol`, plus `psi_uv`
/// for Dxx-frame beams.
pub fn effective_psi_pol(focalplane: &Focalplane, det: &str, dxx: bool) -> Result<f64> {
    let mut psi_pol = focalplane.psi_pol(det)?;
    if dxx {
        psi_pol += focalplane.psi_uv(det)?;
    }
    Ok(psi_pol)
}

/// Angles for one contiguous run of quaternions. Samples with a nonzero
/// `flags` entry are evaluated at [`NULL_QUAT`].
pub fn interval_angles(
    quats: ArrayView2<f64>,
    flags: Option<&[u8]>,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = quats.shape()[0];
    let mut theta = Vec::with_capacity(n);
    let mut phi = Vec::with_capacity(n);
    let mut psi = Vec::with_capacity(n);
    for (i, row) in quats.rows().into_iter().enumerate() {
        let q = match flags {
            Some(f) if f[i] != 0 => NULL_QUAT,
            _ => [row[0], row[1], row[2], row[3]],
        };
        let (t, p, a) = to_angles(&q);
        theta.push(t);
        phi.push(p);
        psi.push(a);
    }
    (theta, phi, psi)
}

pub fn get_pointing(
    data: &[Observation],
    det: &str,
    opts: &PointingOptions,
) -> Result<DetPointing> {
    let mut out = DetPointing::default();
    for obs in data {
        if !obs.has_detector(det) {
            continue;
        }
        let psi_pol = effective_psi_pol(&obs.focalplane, det, opts.dxx)?;
        let quats = obs.det_quat_field(opts.quats, det)?;
        let shared_flags = match opts.shared_flags {
            Some((key, mask)) => Some((obs.shared_flag_field(key)?.view(), mask)),
            None => None,
        };
        let det_flags = match opts.det_flags {
            Some((key, mask)) => Some((obs.det_flag_field(key, det)?, mask)),
            None => None,
        };
        let hwp = match opts.hwp_angle {
            Some(key) => Some(obs.shared_field(key)?.view()),
            None => None,
        };

        for ival in obs.view(opts.view)? {
            let range = ival.start..ival.end;
            let flags = flag_mask(
                shared_flags.map(|(f, m)| (f.slice_move(s![range.clone()]), m)),
                det_flags.map(|(f, m)| (f.slice_move(s![range.clone()]), m)),
            );
            let (theta, phi, mut psi) =
                interval_angles(quats.slice(s![range.clone(), ..]), flags.as_deref());
            psi.iter_mut().for_each(|x| *x -= psi_pol);

            let mut pol = vec![psi_pol; psi.len()];
            if let Some(hwp) = hwp {
                pol.iter_mut()
                    .zip(hwp.slice(s![range.clone()]).iter())
                    .for_each(|(p, &h)| *p += 2.0 * h);
            }

            out.theta.extend(theta);
            out.phi.extend(phi);
            out.psi.extend(psi);
            out.psi_pol.extend(pol);
        }
    }
    Ok(out)
}

pub const PHI: usize = 0;
pub const THETA: usize = 1;
pub const PSI: usize = 2;
pub const SIGNAL: usize = 3;

/// Pointing as handed to the convolution engine: one row per sample with
/// columns `[phi, theta, psi, signal]`. The engine fills the signal column.
#[derive(Clone, Debug)]
pub struct PointingBuffer {
    data: Array2<f64>,
}

impl PointingBuffer {
    pub fn pack(pointing: &DetPointing) -> Self {
        let n = pointing.len();
        let mut data = Array2::zeros((n, 4));
        for i in 0..n {
            data[(i, PHI)] = pointing.phi[i];
            data[(i, THETA)] = pointing.theta[i];
            data[(i, PSI)] = pointing.psi[i];
        }
        Self { data }
    }

    pub fn nrow(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn data(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    pub fn data_mut(&mut self) -> ArrayViewMut2<f64> {
        self.data.view_mut()
    }

    pub fn signal(&self) -> Vec<f64> {
        self.data.column(SIGNAL).to_vec()
    }
}

//! Quaternion helpers for detector attitude.
//!
//! Quaternions are stored as `[x, y, z, w]` with the scalar part last, the
//! layout used by the pointing streams in [`crate::obs::Observation`].

use std::f64::consts::{FRAC_PI_2, PI};

pub type Quat = [f64; 4];

/// Identity rotation. Flagged samples are replaced by this orientation.
pub const NULL_QUAT: Quat = [0.0, 0.0, 0.0, 1.0];

const XAXIS: [f64; 3] = [1.0, 0.0, 0.0];
const YAXIS: [f64; 3] = [0.0, 1.0, 0.0];
const ZAXIS: [f64; 3] = [0.0, 0.0, 1.0];

pub fn norm(q: &Quat) -> f64 {
    q.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub fn normalize(q: &Quat) -> Quat {
    let n = norm(q);
    if n < 1e-10 {
        NULL_QUAT
    } else {
        [q[0] / n, q[1] / n, q[2] / n, q[3] / n]
    }
}

/// Hamilton product `p * q`, i.e. `q` is applied first.
pub fn mult(p: &Quat, q: &Quat) -> Quat {
    let [px, py, pz, pw] = *p;
    let [qx, qy, qz, qw] = *q;
    [
        pw * qx + px * qw + py * qz - pz * qy,
        pw * qy - px * qz + py * qw + pz * qx,
        pw * qz + px * qy - py * qx + pz * qw,
        pw * qw - px * qx - py * qy - pz * qz,
    ]
}

/// Rotation by `angle` radians about a unit `axis`.
pub fn rotation(axis: &[f64; 3], angle: f64) -> Quat {
    let (s, c) = (0.5 * angle).sin_cos();
    [axis[0] * s, axis[1] * s, axis[2] * s, c]
}

fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Rotate the vector `v` by the (normalized) quaternion `q`.
pub fn rotate(q: &Quat, v: &[f64; 3]) -> [f64; 3] {
    let q = normalize(q);
    let u = [q[0], q[1], q[2]];
    let w = q[3];
    let uv = cross(&u, v);
    let t = [2.0 * uv[0], 2.0 * uv[1], 2.0 * uv[2]];
    let ut = cross(&u, &t);
    [
        v[0] + w * t[0] + ut[0],
        v[1] + w * t[1] + ut[1],
        v[2] + w * t[2] + ut[2],
    ]
}

/// Colatitude, longitude and position angle of the pointing described by `q`.
///
/// The line of sight is the rotated z axis and the orientation reference is
/// the rotated x axis. Longitude is wrapped into `[0, 2π)`.
pub fn to_angles(q: &Quat) -> (f64, f64, f64) {
    let dir = rotate(q, &ZAXIS);
    let orient = rotate(q, &XAXIS);

    let theta = FRAC_PI_2 - dir[2].clamp(-1.0, 1.0).asin();
    let mut phi = dir[1].atan2(dir[0]);
    if phi < 0.0 {
        phi += 2.0 * PI;
    }
    let pa = (orient[0] * dir[1] - orient[1] * dir[0]).atan2(
        -(orient[0] * dir[2] * dir[0]) - (orient[1] * dir[2] * dir[1])
            + (orient[2] * (dir[0] * dir[0] + dir[1] * dir[1])),
    );
    (theta, phi, pa)
}

/// Inverse of [`to_angles`] away from the poles.
pub fn from_angles(theta: f64, phi: f64, pa: f64) -> Quat {
    let qphi = rotation(&ZAXIS, phi);
    let qtheta = rotation(&YAXIS, theta);
    let qpa = rotation(&ZAXIS, pa + PI);
    normalize(&mult(&mult(&qphi, &qtheta), &qpa))
}

//! Conversion of engine output to the calibrated convention.
//!
//! The engine returns `(1 + ε)/2 I + (1 - ε)/2 P` for an unnormalized beam.
//! Multiplying by `2 / (1 + ε)` gives `I + (1 - ε)/(1 + ε) P`.

use crate::{
    accumulate::{check_length, detector_segments},
    error::{ConviqtError, Result},
    obs::Observation,
};

pub fn calibration_factor(det: &str, epsilon: f64) -> Result<f64> {
    let denom = 1.0 + epsilon;
    if denom == 0.0 || !denom.is_finite() {
        return Err(ConviqtError::InvalidLeakage {
            det: det.to_string(),
            epsilon,
        });
    }
    Ok(2.0 / denom)
}

/// Rescale `buffer` in place unless the beam is normalized or calibration
/// is disabled. Returns whether anything was scaled.
pub fn calibrate(
    det: &str,
    buffer: &mut [f64],
    epsilon: f64,
    normalized: bool,
    enabled: bool,
) -> Result<bool> {
    if normalized || !enabled {
        return Ok(false);
    }
    let factor = calibration_factor(det, epsilon)?;
    buffer.iter_mut().for_each(|x| *x *= factor);
    Ok(true)
}

/// Calibrate the concatenated signal of `det`, taking the leakage from the
/// focal plane of each observation the samples came from.
pub fn calibrate_signal(
    data: &[Observation],
    det: &str,
    view: Option<&str>,
    buffer: &mut [f64],
    normalized: bool,
    enabled: bool,
) -> Result<bool> {
    if normalized || !enabled {
        return Ok(false);
    }
    let segments = detector_segments(data, det, view)?;
    check_length(det, &segments, buffer.len())?;
    let mut offset = 0;
    for seg in segments {
        let n = seg.interval.len();
        let epsilon = data[seg.obs].focalplane.epsilon(det)?;
        calibrate(det, &mut buffer[offset..offset + n], epsilon, false, true)?;
        offset += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        focalplane::{DetectorProps, Focalplane},
        obs::Interval,
    };
    use approx::assert_relative_eq;

    fn observation(name: &str, n: usize, epsilon: Option<f64>) -> Observation {
        let mut fp = Focalplane::default();
        fp.insert(
            "d",
            DetectorProps {
                psi_pol: Some(0.0),
                pol_leakage: epsilon,
                ..Default::default()
            },
        );
        Observation::new(name, n, vec!["d".to_string()], fp)
    }

    #[test]
    fn normalized_beam_is_left_alone() {
        for eps in [0.0, 0.3, -0.9, 5.0] {
            let mut buf = vec![1.5, -2.0, 0.25];
            assert!(!calibrate("d", &mut buf, eps, true, true).unwrap());
            assert_eq!(buf, vec![1.5, -2.0, 0.25]);
        }
    }

    #[test]
    fn disabled_calibration_is_left_alone() {
        let mut buf = vec![1.0, 2.0];
        assert!(!calibrate("d", &mut buf, 0.0, false, false).unwrap());
        assert_eq!(buf, vec![1.0, 2.0]);
    }

    #[test]
    fn zero_leakage_doubles() {
        let mut buf = vec![1.0, -3.0, 0.5];
        assert!(calibrate("d", &mut buf, 0.0, false, true).unwrap());
        assert_eq!(buf, vec![2.0, -6.0, 1.0]);
    }

    #[test]
    fn leakage_rescales() {
        let mut buf = vec![1.1];
        calibrate("d", &mut buf, 0.1, false, true).unwrap();
        assert_relative_eq!(buf[0], 2.0, max_relative = 1e-14);
    }

    #[test]
    fn total_leakage_cannot_be_calibrated() {
        let err = calibrate("d", &mut [1.0], -1.0, false, true).unwrap_err();
        assert!(matches!(err, ConviqtError::InvalidLeakage { .. }));
    }

    #[test]
    fn leakage_follows_each_observation() {
        let mut a = observation("a", 4, None);
        a.intervals
            .insert("v".to_string(), vec![Interval::new(1, 3)]);
        let mut b = observation("b", 2, Some(1.0));
        b.intervals
            .insert("v".to_string(), vec![Interval::new(0, 2)]);
        let data = vec![a, b];
        let mut buf = vec![1.0; 4];
        assert!(calibrate_signal(&data, "d", Some("v"), &mut buf, false, true).unwrap());
        assert_eq!(buf, vec![2.0, 2.0, 1.0, 1.0]);

        let mut short = vec![1.0; 3];
        assert!(matches!(
            calibrate_signal(&data, "d", Some("v"), &mut short, false, true),
            Err(ConviqtError::LengthMismatch { .. })
        ));
    }
}

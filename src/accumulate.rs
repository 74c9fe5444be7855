//! Writing a detector's concatenated signal back into interval storage.

use ndarray::{s, ArrayView1};

use crate::{
    error::{ConviqtError, Result},
    obs::{Interval, Observation},
};

/// One contiguous run of a detector's samples: an interval of the
/// observation at index `obs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub obs: usize,
    pub interval: Interval,
}

/// Storage runs of `det` in the same order the pointing extraction visits
/// them: observation order, then interval order.
pub fn detector_segments(data: &[Observation], det: &str, view: Option<&str>) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    for (iobs, obs) in data.iter().enumerate() {
        if !obs.has_detector(det) {
            continue;
        }
        for interval in obs.view(view)? {
            segments.push(Segment {
                obs: iobs,
                interval,
            });
        }
    }
    Ok(segments)
}

/// The segments must account for exactly `len` samples.
pub fn check_length(det: &str, segments: &[Segment], len: usize) -> Result<()> {
    let expected: usize = segments.iter().map(|s| s.interval.len()).sum();
    if expected != len {
        return Err(ConviqtError::LengthMismatch {
            det: det.to_string(),
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Add `buffer` to the `key` data of `det`, one segment at a time.
///
/// The length check happens before anything is written, so a mismatch
/// leaves the storage untouched.
pub fn save(
    data: &mut [Observation],
    det: &str,
    view: Option<&str>,
    key: &str,
    buffer: &[f64],
) -> Result<()> {
    let segments = detector_segments(data, det, view)?;
    check_length(det, &segments, buffer.len())?;
    for seg in &segments {
        data[seg.obs].detdata_field(key, det)?;
    }
    let mut offset = 0;
    for seg in segments {
        let n = seg.interval.len();
        let mut row = data[seg.obs].detdata_field_mut(key, det)?;
        let mut target = row.slice_mut(s![seg.interval.start..seg.interval.end]);
        target += &ArrayView1::from(&buffer[offset..offset + n]);
        offset += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focalplane::Focalplane;

    fn data() -> Vec<Observation> {
        let dets = vec!["a".to_string(), "b".to_string()];
        let mut o1 = Observation::new("o1", 6, dets.clone(), Focalplane::default());
        o1.intervals.insert(
            "scan".to_string(),
            vec![Interval::new(0, 2), Interval::new(3, 5)],
        );
        let mut o2 = Observation::new("o2", 3, vec!["b".to_string()], Focalplane::default());
        o2.intervals
            .insert("scan".to_string(), vec![Interval::new(1, 3)]);
        let mut o3 = Observation::new("o3", 2, dets, Focalplane::default());
        o3.intervals
            .insert("scan".to_string(), vec![Interval::new(0, 2)]);
        let mut data = vec![o1, o2, o3];
        data.iter_mut()
            .for_each(|o| o.ensure_detdata("signal").unwrap());
        data
    }

    #[test]
    fn samples_land_in_their_views() {
        let mut data = data();
        let buffer = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        save(&mut data, "a", Some("scan"), "signal", &buffer).unwrap();
        assert_eq!(
            data[0].detdata_field("signal", "a").unwrap().to_vec(),
            vec![1.0, 2.0, 0.0, 3.0, 4.0, 0.0]
        );
        assert_eq!(
            data[2].detdata_field("signal", "a").unwrap().to_vec(),
            vec![5.0, 6.0]
        );
        // other detector untouched
        assert!(data[0]
            .detdata_field("signal", "b")
            .unwrap()
            .iter()
            .all(|&x| x == 0.0));
    }

    #[test]
    fn writes_add_to_existing_signal() {
        let mut data = data();
        let buffer = vec![1.0; 8];
        save(&mut data, "b", Some("scan"), "signal", &buffer).unwrap();
        save(&mut data, "b", Some("scan"), "signal", &buffer).unwrap();
        assert_eq!(
            data[1].detdata_field("signal", "b").unwrap().to_vec(),
            vec![0.0, 2.0, 2.0]
        );
    }

    #[test]
    fn length_mismatch_is_fatal_and_writes_nothing() {
        let mut data = data();
        for len in [5, 7] {
            let err = save(&mut data, "a", Some("scan"), "signal", &vec![1.0; len]).unwrap_err();
            assert!(matches!(
                err,
                ConviqtError::LengthMismatch {
                    expected: 6,
                    ..
                }
            ));
        }
        assert!(data
            .iter()
            .all(|o| o.detdata["signal"].iter().all(|&x| x == 0.0)));
    }

    #[test]
    fn misshaped_storage_is_an_error() {
        let mut good = Observation::new("o1", 4, vec!["d".to_string()], Focalplane::default());
        good.ensure_detdata("signal").unwrap();
        let mut bad = Observation::new("o2", 4, vec!["d".to_string()], Focalplane::default());
        bad.detdata
            .insert("signal".to_string(), ndarray::Array2::zeros((1, 2)));
        let mut data = vec![good, bad];
        assert!(matches!(
            save(&mut data, "d", None, "signal", &[1.0; 8]),
            Err(ConviqtError::BadShape { .. })
        ));
        // the well-formed observation is left alone too
        assert!(data[0].detdata["signal"].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn absent_detector_takes_an_empty_buffer() {
        let mut data = data();
        save(&mut data, "zz", Some("scan"), "signal", &[]).unwrap();
        assert!(detector_segments(&data, "zz", None).unwrap().is_empty());
    }

    #[test]
    fn default_view_covers_whole_observations() {
        let data = data();
        let segs = detector_segments(&data, "b", None).unwrap();
        let lens: Vec<usize> = segs.iter().map(|s| s.interval.len()).collect();
        assert_eq!(lens, vec![6, 3, 2]);
    }
}

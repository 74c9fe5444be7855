use std::{path::Path, sync::Arc, sync::Mutex};

use approx::assert_abs_diff_eq;
use ndarray::{arr1, Array2};
use num::complex::Complex;

use conviqt_tod::{
    alm::{Alm, BeamExpansion, SkyExpansion},
    comm::{Communicator, SelfComm},
    detpointing::BoresightPointing,
    engine::{Convolver, ConvolverFactory, ConvolverParams, EngineDetector},
    focalplane::{DetectorProps, Focalplane},
    loader::AlmLoader,
    obs::{Interval, Observation},
    pointing::{PointingBuffer, PHI, PSI, SIGNAL, THETA},
    quat::{from_angles, to_angles, NULL_QUAT},
    BeamModel, ConviqtConfig, Result, SimConviqt,
};

/// Keeps a copy of every pointing buffer it sees and writes
/// `theta + 10 phi + 100 psi` as the signal.
#[derive(Default)]
struct RecordingEngine {
    seen: Mutex<Vec<Array2<f64>>>,
}

struct RecordingConvolver<'a> {
    seen: &'a Mutex<Vec<Array2<f64>>>,
}

impl<'a> Convolver for RecordingConvolver<'a> {
    fn convolve(&mut self, pnt: &mut PointingBuffer) -> Result<()> {
        let mut data = pnt.data_mut();
        for mut row in data.rows_mut() {
            row[SIGNAL] = row[THETA] + 10.0 * row[PHI] + 100.0 * row[PSI];
        }
        self.seen.lock().unwrap().push(pnt.data().to_owned());
        Ok(())
    }
}

impl ConvolverFactory for RecordingEngine {
    fn available(&self) -> bool {
        true
    }

    fn create<'a>(
        &'a self,
        _sky: &'a SkyExpansion,
        _beam: &'a BeamExpansion,
        detector: &EngineDetector,
        _params: &ConvolverParams,
        _comm: &'a dyn Communicator,
    ) -> Result<Box<dyn Convolver + 'a>> {
        assert_eq!(detector.epsilon, 0.0);
        Ok(Box::new(RecordingConvolver { seen: &self.seen }))
    }
}

struct NormalizedBeamLoader;

impl AlmLoader for NormalizedBeamLoader {
    fn load_sky(
        &self,
        _path: &Path,
        _lmax: Option<usize>,
        _pol: bool,
        _fwhm_arcmin: f64,
        _comm: &dyn Communicator,
    ) -> Result<SkyExpansion> {
        SkyExpansion::new(vec![Alm::zeros(4, 4)?])
    }

    fn load_beam(
        &self,
        _path: &Path,
        _lmax: Option<usize>,
        _mmax: Option<usize>,
        _pol: bool,
        _comm: &dyn Communicator,
    ) -> Result<BeamExpansion> {
        let mut b = Alm::zeros(4, 0)?;
        b.set(0, 0, Complex::new(1.0, 0.0));
        let mut beam = BeamExpansion::new(vec![b], false)?;
        beam.normalize()?;
        Ok(beam)
    }
}

const ANGLES: [(f64, f64, f64); 4] = [
    (0.4, 1.0, 0.3),
    (1.1, 2.0, -0.2),
    (1.6, 3.0, 0.7),
    (2.2, 4.0, 1.2),
];

fn observation() -> Observation {
    let mut fp = Focalplane::default();
    fp.insert(
        "det",
        DetectorProps {
            psi_pol: Some(0.1),
            psi_uv: Some(0.25),
            pol_leakage: Some(0.5),
            quat: Some(NULL_QUAT),
            ..Default::default()
        },
    );
    let mut obs = Observation::new("obs", 6, vec!["det".to_string()], fp);
    let mut bore = Array2::zeros((6, 4));
    for i in 0..6 {
        let (t, p, a) = ANGLES[i % 4];
        let q = from_angles(t, p, a);
        for k in 0..4 {
            bore[(i, k)] = q[k];
        }
    }
    obs.shared_quats.insert("boresight_radec".to_string(), bore);
    obs.intervals
        .insert("scan".to_string(), vec![Interval::new(1, 5)]);
    obs.shared_flags
        .insert("flags".to_string(), arr1(&[1u8, 0, 1, 0, 0, 1]));
    obs.shared.insert("hwp".to_string(), arr1(&[0.0; 6]));
    obs.ensure_detdata("signal").unwrap();
    obs.detdata.get_mut("signal").unwrap().fill(5.0);
    obs
}

#[test]
fn single_detector_static_normalized_run() {
    let engine = Arc::new(RecordingEngine::default());
    let config = ConviqtConfig {
        beam_model: BeamModel::Static,
        view: Some("scan".to_string()),
        apply_flags: true,
        shared_flags: Some("flags".to_string()),
        shared_flag_mask: 1,
        hwp_angle: Some("hwp".to_string()),
        dxx: false,
        sky_file: Some("sky.yaml".to_string()),
        beam_file: Some("beam.yaml".to_string()),
        ..Default::default()
    };
    let op = SimConviqt::new(config, engine.clone(), Arc::new(NormalizedBeamLoader))
        .unwrap()
        .with_comm(Arc::new(SelfComm))
        .with_detector_pointing(Arc::new(BoresightPointing::default()));
    let mut data = vec![observation()];
    op.exec(&mut data, None).unwrap();

    let seen = engine.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let pnt = &seen[0];
    assert_eq!(pnt.nrows(), 4);

    // view samples 1..5 of the observation; sample 2 (the second of the view) is flagged
    let (t0, p0, a0) = to_angles(&NULL_QUAT);
    for (row, sample) in (1..5).enumerate() {
        let (t, p, a) = if sample == 2 { (t0, p0, a0) } else { ANGLES[sample % 4] };
        assert_abs_diff_eq!(pnt[(row, THETA)], t, epsilon = 1e-12);
        assert_abs_diff_eq!(pnt[(row, PHI)], p, epsilon = 1e-12);
        assert_abs_diff_eq!(pnt[(row, PSI)], a - 0.1, epsilon = 1e-12);
    }

    // normalized beam: engine output lands unscaled on top of the old signal
    let signal = data[0].detdata_field("signal", "det").unwrap();
    assert_eq!(signal[0], 5.0);
    assert_eq!(signal[5], 5.0);
    for (row, sample) in (1..5).enumerate() {
        let expected = pnt[(row, THETA)] + 10.0 * pnt[(row, PHI)] + 100.0 * pnt[(row, PSI)];
        assert_abs_diff_eq!(signal[sample], 5.0 + expected, epsilon = 1e-9);
    }
}

#[test]
fn unnormalized_beam_is_calibrated_with_the_leakage() {
    struct RawBeamLoader;

    impl AlmLoader for RawBeamLoader {
        fn load_sky(
            &self,
            path: &Path,
            lmax: Option<usize>,
            pol: bool,
            fwhm_arcmin: f64,
            comm: &dyn Communicator,
        ) -> Result<SkyExpansion> {
            NormalizedBeamLoader.load_sky(path, lmax, pol, fwhm_arcmin, comm)
        }

        fn load_beam(
            &self,
            _path: &Path,
            _lmax: Option<usize>,
            _mmax: Option<usize>,
            _pol: bool,
            _comm: &dyn Communicator,
        ) -> Result<BeamExpansion> {
            BeamExpansion::new(vec![Alm::zeros(4, 0)?], false)
        }
    }

    let engine = Arc::new(RecordingEngine::default());
    let config = ConviqtConfig {
        sky_file: Some("sky.yaml".to_string()),
        beam_file: Some("beam.yaml".to_string()),
        ..Default::default()
    };
    let op = SimConviqt::new(config, engine.clone(), Arc::new(RawBeamLoader))
        .unwrap()
        .with_comm(Arc::new(SelfComm))
        .with_detector_pointing(Arc::new(BoresightPointing::default()));
    let mut data = vec![observation()];
    op.exec(&mut data, None).unwrap();

    let seen = engine.seen.lock().unwrap();
    let pnt = &seen[0];
    assert_eq!(pnt.nrows(), 6);
    let signal = data[0].detdata_field("signal", "det").unwrap();
    for i in 0..6 {
        let raw = pnt[(i, THETA)] + 10.0 * pnt[(i, PHI)] + 100.0 * pnt[(i, PSI)];
        assert_abs_diff_eq!(signal[i], 5.0 + raw * 2.0 / 1.5, epsilon = 1e-9);
    }
}

//! The beam-sky convolution operator.

use std::{path::Path, sync::Arc};

use log::{debug, info};

use crate::{
    accumulate::save,
    alm::{BeamExpansion, SkyExpansion},
    calibrate::calibrate_signal,
    comm::Communicator,
    config::{BeamModel, ConviqtConfig},
    detpointing::DetectorPointing,
    engine::{ConvolverFactory, EngineDetector},
    error::{ConviqtError, Result},
    filenames::{axis_beam_files, beam_file, sky_file},
    loader::AlmLoader,
    obs::Observation,
    pointing::{get_pointing, DetPointing, PointingOptions},
    schedule::{agree_on_detectors, local_detector_set},
    strategy::{AxisBeam, Convolution},
    utils::Timer,
};

/// Convolves sky and beam expansions along the detector pointing and adds
/// the result to the detector data.
///
/// Every rank of the process group must call [`SimConviqt::exec`] together:
/// the detector list is agreed on collectively and every engine call is a
/// collective operation.
pub struct SimConviqt {
    config: ConviqtConfig,
    engine: Arc<dyn ConvolverFactory>,
    loader: Arc<dyn AlmLoader>,
    comm: Option<Arc<dyn Communicator>>,
    detector_pointing: Option<Arc<dyn DetectorPointing>>,
}

impl SimConviqt {
    pub fn new(
        config: ConviqtConfig,
        engine: Arc<dyn ConvolverFactory>,
        loader: Arc<dyn AlmLoader>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            engine,
            loader,
            comm: None,
            detector_pointing: None,
        })
    }

    pub fn with_comm(mut self, comm: Arc<dyn Communicator>) -> Self {
        self.comm = Some(comm);
        self
    }

    pub fn with_detector_pointing(mut self, pointing: Arc<dyn DetectorPointing>) -> Self {
        self.detector_pointing = Some(pointing);
        self
    }

    pub fn config(&self) -> &ConviqtConfig {
        &self.config
    }

    pub fn available(&self) -> bool {
        self.engine.available()
    }

    pub fn exec(&self, data: &mut [Observation], detectors: Option<&[String]>) -> Result<()> {
        if !self.engine.available() {
            return Err(ConviqtError::EngineUnavailable);
        }
        let comm = self.comm.as_deref().ok_or(ConviqtError::NoCommunicator)?;
        let pointing_op = self
            .detector_pointing
            .as_deref()
            .ok_or(ConviqtError::NoDetectorPointing)?;

        let verbose = comm.rank() == 0 && self.config.verbosity > 0;
        let mut timer = Timer::new();

        let all_detectors = self.get_all_detectors(data, detectors, comm)?;
        debug!(
            "rank {} convolving {} detectors",
            comm.rank(),
            all_detectors.len()
        );

        for det in &all_detectors {
            pointing_op.apply(data, Some(std::slice::from_ref(det)))?;
            self.process_detector(data, det, pointing_op.quats(), comm, verbose)?;
            if verbose {
                timer.report_clear(&format!("conviqt process detector {}", det));
            }
        }
        Ok(())
    }

    /// Ordered union of the detectors over all ranks. Also makes sure the
    /// output field exists in every local observation.
    fn get_all_detectors(
        &self,
        data: &mut [Observation],
        detectors: Option<&[String]>,
        comm: &dyn Communicator,
    ) -> Result<Vec<String>> {
        for obs in data.iter_mut() {
            obs.ensure_detdata(&self.config.det_data)?;
        }
        agree_on_detectors(&local_detector_set(data, detectors), comm)
    }

    fn process_detector(
        &self,
        data: &mut [Observation],
        det: &str,
        quats: &str,
        comm: &dyn Communicator,
        verbose: bool,
    ) -> Result<()> {
        let mut timer = Timer::new();
        let sky = self.get_sky(&sky_file(&self.config, det)?, det, comm, verbose)?;
        let base_beam = beam_file(&self.config, det)?;

        let pointing = self.get_pointing(data, det, quats)?;
        if verbose {
            timer.report_clear(&format!("compute pointing angles for detector {}", det));
        }

        let conv = Convolution {
            factory: self.engine.as_ref(),
            comm,
            detector: EngineDetector {
                name: det.to_string(),
                // leakage is applied by the calibration step
                epsilon: 0.0,
            },
            pol: self.config.pol,
            lmax: self.config.lmax,
            mmax: self.config.beammmax,
            order: self.config.order,
            verbosity: self.config.verbosity,
        };

        let (mut signal, normalized) = match self.config.beam_model {
            BeamModel::Static => {
                let beam = self.get_beam(&base_beam, det, comm, verbose)?;
                let signal = conv.convolve_static(&sky, &beam, &pointing)?;
                (signal, beam.normalized())
            }
            BeamModel::Weighted => {
                let files = axis_beam_files(&base_beam)?;
                conv.convolve_weighted(&sky, &pointing, |axis: AxisBeam| {
                    self.get_beam(&files[axis.index()], det, comm, verbose)
                })?
            }
        };
        drop(sky);
        if verbose {
            timer.report_clear(&format!("convolve detector {}", det));
        }

        let view = self.config.view.as_deref();
        let scaled = calibrate_signal(
            data,
            det,
            view,
            &mut signal,
            normalized,
            self.config.calibrate,
        )?;
        if verbose && scaled {
            timer.report_clear(&format!("calibrate detector {}", det));
        }

        save(data, det, view, &self.config.det_data, &signal)?;
        if verbose {
            timer.report_clear(&format!("save detector {}", det));
        }
        Ok(())
    }

    fn get_sky(
        &self,
        file: &str,
        det: &str,
        comm: &dyn Communicator,
        verbose: bool,
    ) -> Result<SkyExpansion> {
        let mut timer = Timer::new();
        let mut sky = self.loader.load_sky(
            Path::new(file),
            self.config.lmax,
            self.config.pol,
            self.config.fwhm_arcmin,
            comm,
        )?;
        if self.config.remove_monopole {
            sky.remove_monopole();
        }
        if self.config.remove_dipole {
            sky.remove_dipole();
        }
        if verbose {
            timer.report_clear(&format!("initialize sky for detector {}", det));
        }
        Ok(sky)
    }

    fn get_beam(
        &self,
        file: &str,
        det: &str,
        comm: &dyn Communicator,
        verbose: bool,
    ) -> Result<BeamExpansion> {
        let mut timer = Timer::new();
        let mut beam = self.loader.load_beam(
            Path::new(file),
            self.config.lmax,
            self.config.beammmax,
            self.config.pol,
            comm,
        )?;
        if self.config.normalize_beam {
            beam.normalize()?;
        }
        if verbose {
            timer.report_clear(&format!("initialize beam {} for detector {}", file, det));
        }
        Ok(beam)
    }

    fn pointing_options<'a>(&'a self, quats: &'a str) -> PointingOptions<'a> {
        let (shared_flags, det_flags) = if self.config.apply_flags {
            (
                self.config
                    .shared_flags
                    .as_deref()
                    .map(|k| (k, self.config.shared_mask())),
                self.config
                    .det_flags
                    .as_deref()
                    .map(|k| (k, self.config.det_mask())),
            )
        } else {
            (None, None)
        };
        PointingOptions {
            view: self.config.view.as_deref(),
            quats,
            shared_flags,
            det_flags,
            dxx: self.config.dxx,
            hwp_angle: self.config.hwp_angle.as_deref(),
        }
    }

    fn get_pointing(&self, data: &[Observation], det: &str, quats: &str) -> Result<DetPointing> {
        let pointing = get_pointing(data, det, &self.pointing_options(quats))?;
        if pointing.is_empty() {
            info!("no local samples of {}, joining the engine call anyway", det);
        }
        Ok(pointing)
    }
}

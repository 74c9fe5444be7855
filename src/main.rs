use std::{
    collections::BTreeMap,
    f64::consts::PI,
    fs::File,
    sync::Arc,
};

use clap::{
    App
    ,Arg
};

use log::error;

use ndarray::{Array1, Array2};

use serde::Deserialize;
use serde_yaml::{from_reader, to_writer};

use conviqt_tod::{
    comm::SelfComm,
    detpointing::BoresightPointing,
    engine::DirectSumFactory,
    focalplane::Focalplane,
    loader::YamlAlmLoader,
    obs::{Interval, Observation},
    quat::from_angles,
    ConviqtConfig, SimConviqt,
};

/// Boresight spinning at constant colatitude.
#[derive(Deserialize)]
struct ScanCfg {
    name: String,
    n_samples: usize,
    /// Hz
    sample_rate: f64,
    /// seconds per revolution of the boresight longitude
    spin_period: f64,
    /// rad
    colatitude: f64,
    /// revolutions per second, no HWP stream when absent
    #[serde(default)]
    hwp_rate: Option<f64>,
    /// focalplane yaml file
    focalplane: String,
    #[serde(default)]
    views: BTreeMap<String, Vec<(usize, usize)>>,
}

fn build_observation(cfg: &ScanCfg, focalplane: Focalplane) -> Observation {
    let dets: Vec<String> = focalplane.detectors.keys().cloned().collect();
    let mut obs = Observation::new(&cfg.name, cfg.n_samples, dets, focalplane);
    let mut boresight = Array2::zeros((cfg.n_samples, 4));
    for i in 0..cfg.n_samples {
        let t = i as f64 / cfg.sample_rate;
        let q = from_angles(cfg.colatitude, 2.0 * PI * t / cfg.spin_period, 0.0);
        for k in 0..4 {
            boresight[(i, k)] = q[k];
        }
    }
    obs.shared_quats
        .insert("boresight_radec".to_string(), boresight);
    if let Some(rate) = cfg.hwp_rate {
        let hwp = Array1::from_iter(
            (0..cfg.n_samples).map(|i| (2.0 * PI * rate * i as f64 / cfg.sample_rate) % (2.0 * PI)),
        );
        obs.shared.insert("hwp_angle".to_string(), hwp);
    }
    for (name, ivals) in &cfg.views {
        obs.intervals.insert(
            name.clone(),
            ivals.iter().map(|&(a, b)| Interval::new(a, b)).collect(),
        );
    }
    obs
}

pub fn main() {
    env_logger::init();
    let matches = App::new("conviqt_tod")
        .about("beam-convolved detector timestreams of a synthetic scan")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .takes_value(true)
                .value_name("run config")
                .required(true)
                .help("operator config in yaml"),
        )
        .arg(
            Arg::new("obs")
                .short('s')
                .long("obs")
                .takes_value(true)
                .value_name("scan config")
                .required(true)
                .help("scan and focalplane description in yaml"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("out")
                .takes_value(true)
                .value_name("outfile")
                .required(true)
                .help("output yaml with one timestream per detector"),
        )
        .get_matches();

    let config = ConviqtConfig::from_yaml_file(matches.value_of("config").unwrap()).unwrap();
    let scan: ScanCfg = from_reader(File::open(matches.value_of("obs").unwrap()).unwrap()).unwrap();
    let out_file_name = matches.value_of("outfile").unwrap();

    let det_data = config.det_data.clone();
    let op = SimConviqt::new(config, Arc::new(DirectSumFactory), Arc::new(YamlAlmLoader))
        .unwrap()
        .with_comm(Arc::new(SelfComm))
        .with_detector_pointing(Arc::new(BoresightPointing::default()));

    let focalplane = Focalplane::from_yaml_file(&scan.focalplane).unwrap();
    let mut data = vec![build_observation(&scan, focalplane)];
    if let Err(e) = op.exec(&mut data, None) {
        error!("{}", e);
        std::process::exit(1);
    }

    let obs = &data[0];
    let result: BTreeMap<String, Vec<f64>> = obs
        .local_detectors
        .iter()
        .map(|det| {
            (
                det.clone(),
                obs.detdata_field(&det_data, det).unwrap().to_vec(),
            )
        })
        .collect();
    let mut outfile = File::create(out_file_name).unwrap();
    to_writer(&mut outfile, &result).unwrap();
}

use std::f64::consts::PI;

use clap::{
    App
    ,Arg
};

use num::complex::Complex;

use conviqt_tod::{alm::Alm, loader::AlmFile};

fn main() {
    let matches = App::new("gauss_beam")
        .about("write the harmonic coefficients of a gaussian beam")
        .arg(
            Arg::new("lmax")
                .short('l')
                .long("lmax")
                .takes_value(true)
                .value_name("lmax")
                .required(true)
                .help("maximum ell"),
        )
        .arg(
            Arg::new("fwhm_arcmin")
                .short('f')
                .long("fwhm")
                .takes_value(true)
                .value_name("fwhm in arcmin")
                .required(true)
                .help("full width at half maximum"),
        )
        .arg(
            Arg::new("pol")
                .short('p')
                .long("pol")
                .takes_value(false)
                .help("also write the E and B components"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("out")
                .takes_value(true)
                .value_name("output file name")
                .required(true)
                .help("output yaml file"),
        )
        .get_matches();

    let lmax = matches.value_of("lmax").unwrap().parse::<usize>().unwrap();
    let fwhm = matches
        .value_of("fwhm_arcmin")
        .unwrap()
        .parse::<f64>()
        .unwrap()
        / 60.0;
    let pol = matches.is_present("pol");
    let outfile = matches.value_of("outfile").unwrap();

    let sigma2 = (fwhm.to_radians() / (8.0 * 2_f64.ln()).sqrt()).powi(2);
    let mmax = if pol { lmax.min(2) } else { 0 };
    let mut t = Alm::zeros(lmax, mmax).unwrap();
    let mut e = Alm::zeros(lmax, mmax).unwrap();
    let mut b = Alm::zeros(lmax, mmax).unwrap();
    for l in 0..=lmax {
        let g = (-0.5 * sigma2 * (l * (l + 1)) as f64).exp();
        t.set(l, 0, Complex::new(((2 * l + 1) as f64 / (4.0 * PI)).sqrt() * g, 0.0));
        if pol && l >= 2 {
            let p = ((2 * l + 1) as f64 / (32.0 * PI)).sqrt() * g;
            e.set(l, 2, Complex::new(p, 0.0));
            b.set(l, 2, Complex::new(0.0, p));
        }
    }
    let alms = if pol { vec![t, e, b] } else { vec![t] };
    AlmFile::from_alms(&alms, true).write(outfile).unwrap();
}

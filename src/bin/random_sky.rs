use clap::{
    App
    ,Arg
};

use num::complex::Complex;

use rand::{distributions::Uniform, thread_rng, Rng};

use conviqt_tod::{alm::Alm, loader::AlmFile};

fn main() {
    let matches = App::new("random_sky")
        .about("write random sky coefficients with a falling spectrum")
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
            Arg::new("pol")
                .short('p')
                .long("pol")
                .takes_value(false)
                .help("also write E and B"),
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
    let ncomp = if matches.is_present("pol") { 3 } else { 1 };
    let outfile = matches.value_of("outfile").unwrap();

    let mut rng = thread_rng();
    let dist = Uniform::<f64>::new(-1.0, 1.0);
    let alms: Vec<_> = (0..ncomp)
        .map(|comp| {
            // polarization an order of magnitude below intensity
            let amp = if comp == 0 { 1.0 } else { 0.1 };
            let mut a = Alm::zeros(lmax, lmax).unwrap();
            for m in 0..=lmax {
                for l in m..=lmax {
                    if comp > 0 && l < 2 {
                        continue;
                    }
                    let scale = amp / (l + 1) as f64;
                    let im = if m == 0 { 0.0 } else { rng.sample(dist) };
                    a.set(l, m, Complex::new(rng.sample(dist), im) * scale);
                }
            }
            a
        })
        .collect();
    AlmFile::from_alms(&alms, false).write(outfile).unwrap();
}

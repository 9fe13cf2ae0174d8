use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use tau_corr::{Correlator, CorrelatorConfig};

const N_SAMPLES: usize = 10_000_000;
const NUMCORRELATORS: usize = 32;
const P: usize = 16;
const M: usize = 2;
const DECAY: f64 = 0.99;

fn main() {
    let config = CorrelatorConfig::new(NUMCORRELATORS, P, M);
    let mut corr = Correlator::new(config).unwrap();

    let mut rng = Xoshiro256StarStar::seed_from_u64(42);
    let series: Vec<f64> = {
        let mut x = 0.0;
        (0..N_SAMPLES)
            .map(|_| {
                x = DECAY * x + (rng.gen::<f64>() - 0.5);
                x
            })
            .collect()
    };

    println!(
        "Levels: {}  |  Bins: {}  |  Decimation: {}  |  Samples: {}",
        NUMCORRELATORS, P, M, N_SAMPLES
    );
    println!("{}", "-".repeat(70));

    let t0 = Instant::now();
    for &x in &series {
        corr.add(x);
    }
    let add_elapsed = t0.elapsed().as_secs_f64();

    let t1 = Instant::now();
    corr.evaluate(true);
    let eval_elapsed = t1.elapsed().as_secs_f64();

    println!(
        "add: {:.3} s  |  {:.1} ns/sample  |  evaluate: {:.3} ms  |  points: {}",
        add_elapsed,
        add_elapsed / N_SAMPLES as f64 * 1e9,
        eval_elapsed * 1000.0,
        corr.npcorr()
    );

    let g0 = corr.f()[0];
    for (t, f) in corr.points().step_by(8) {
        println!("{:>12.0}  {:>10.6}", t, f / g0);
    }
}

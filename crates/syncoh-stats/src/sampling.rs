// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rand::Rng;
use std::f64::consts::PI;

/// Box-Muller standard normal draw.
pub fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1 = rng.random::<f64>().clamp(f64::MIN_POSITIVE, 1.0);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

pub fn standard_normal_vec(rng: &mut impl Rng, d: usize) -> Vec<f64> {
    (0..d).map(|_| standard_normal(rng)).collect()
}

pub fn normal(rng: &mut impl Rng, mean: f64, std: f64) -> f64 {
    if std <= 1e-12 {
        return mean;
    }
    mean + std * standard_normal(rng)
}

/// Uniform draw on `[lo, hi]`; returns `lo` for an empty interval.
pub fn uniform(rng: &mut impl Rng, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return lo;
    }
    lo + (hi - lo) * rng.random::<f64>()
}

#[cfg(test)]
mod tests {
    use super::{normal, standard_normal, uniform};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn standard_normal_moments_are_plausible() {
        let mut rng = StdRng::seed_from_u64(3);
        let draws = (0..20_000)
            .map(|_| standard_normal(&mut rng))
            .collect::<Vec<_>>();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>()
            / (draws.len() - 1) as f64;
        assert!(mean.abs() < 0.05, "mean={mean}");
        assert!((var - 1.0).abs() < 0.05, "var={var}");
    }

    #[test]
    fn degenerate_parameters_return_location() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(normal(&mut rng, 4.5, 0.0), 4.5);
        assert_eq!(uniform(&mut rng, 2.0, 2.0), 2.0);
        for _ in 0..100 {
            let x = uniform(&mut rng, -1.0, 3.0);
            assert!((-1.0..=3.0).contains(&x));
        }
    }
}

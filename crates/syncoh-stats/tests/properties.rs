// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use syncoh_stats::{iqr, pearson, quantile, wasserstein_1d};

const MIN_PROPTEST_CASES: u32 = 64;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn sample() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-500.0f64..500.0, 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 512,
        .. ProptestConfig::default()
    })]

    #[test]
    fn wasserstein_is_symmetric_and_non_negative(a in sample(), b in sample()) {
        let ab = wasserstein_1d(&a, &b).expect("non-empty samples");
        let ba = wasserstein_1d(&b, &a).expect("non-empty samples");
        prop_assert!(ab >= 0.0);
        prop_assert!((ab - ba).abs() <= 1e-9 * (1.0 + ab));
    }

    #[test]
    fn wasserstein_of_shift_equals_shift(a in sample(), shift in -50.0f64..50.0) {
        let moved = a.iter().map(|x| x + shift).collect::<Vec<_>>();
        let d = wasserstein_1d(&a, &moved).expect("non-empty samples");
        prop_assert!((d - shift.abs()).abs() <= 1e-6);
    }

    #[test]
    fn quantiles_stay_within_sample_range(a in sample(), p in 0.0f64..=1.0) {
        let q = quantile(&a, p).expect("non-empty sample");
        let lo = a.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = a.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(q >= lo - 1e-9 && q <= hi + 1e-9);
        prop_assert!(iqr(&a).expect("non-empty sample") >= -1e-9);
    }

    #[test]
    fn pearson_is_bounded(pairs in prop::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 2..30)) {
        let x = pairs.iter().map(|(a, _)| *a).collect::<Vec<_>>();
        let y = pairs.iter().map(|(_, b)| *b).collect::<Vec<_>>();
        let r = pearson(&x, &y);
        prop_assert!((-1.0..=1.0).contains(&r));
    }
}

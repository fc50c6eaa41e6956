// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use syncoh_core::{Arm, Cohort, Record, VisitSchedule};
use syncoh_eval::{Grade, MetricKind, ScoreConfig, score};

const MIN_PROPTEST_CASES: u32 = 48;
const FIELDS: [&str; 3] = ["SystolicBP", "DiastolicBP", "HeartRate"];

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn rows() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((80.0f64..200.0, 40.0f64..120.0, 40.0f64..140.0), 6..40)
}

fn cohort(rows: &[(f64, f64, f64)]) -> Cohort {
    let schedule = VisitSchedule::new(["Baseline"]).expect("valid schedule");
    let records = rows
        .iter()
        .enumerate()
        .map(|(i, (sbp, dbp, hr))| {
            let arm = if i % 2 == 0 { Arm::Active } else { Arm::Placebo };
            Record::new(format!("P{i:03}"), "Baseline", arm)
                .with_value(FIELDS[0], *sbp)
                .with_value(FIELDS[1], *dbp)
                .with_value(FIELDS[2], *hr)
        })
        .collect();
    Cohort::new(
        schedule,
        FIELDS.iter().map(|f| f.to_string()).collect(),
        records,
    )
    .expect("valid cohort")
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 512,
        .. ProptestConfig::default()
    })]

    #[test]
    fn scores_are_bounded_and_consistent(real in rows(), synthetic in rows(), seed in any::<u64>()) {
        let config = ScoreConfig { k: 3, seed, ..ScoreConfig::default() };
        let report = score(&cohort(&real), &cohort(&synthetic), &config)
            .expect("scoring random cohorts should succeed");
        for kind in MetricKind::ALL {
            let value = report.scores.get(kind);
            prop_assert!((0.0..=1.0).contains(&value), "{}={value}", kind.as_str());
        }
        prop_assert!((0.0..=1.0).contains(&report.overall_quality));
        prop_assert_eq!(report.quality_grade, Grade::from_score(report.overall_quality));
        for kind in &report.strengths {
            prop_assert!(!report.weaknesses.contains(kind));
        }
    }

    #[test]
    fn scoring_is_deterministic(real in rows(), synthetic in rows()) {
        let config = ScoreConfig { k: 3, ..ScoreConfig::default() };
        let (real, synthetic) = (cohort(&real), cohort(&synthetic));
        let first = score(&real, &synthetic, &config).expect("scoring should succeed");
        let second = score(&real, &synthetic, &config).expect("scoring should succeed");
        prop_assert_eq!(first, second);
    }
}

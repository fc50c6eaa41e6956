// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use rand::Rng;
use syncoh_core::{Arm, Cohort, Record, RngStream, VisitSchedule, seeded_rng};

const MIN_PROPTEST_CASES: u32 = 64;
const VISITS: [&str; 4] = ["Screening", "Baseline", "Week 4", "Week 8"];

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

/// Per subject: a non-empty visit mask over `VISITS`.
fn visit_masks() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(1u8..16, 1..12)
}

fn records_for(masks: &[u8]) -> Vec<Record> {
    let mut records = Vec::new();
    for (i, mask) in masks.iter().enumerate() {
        let arm = if i % 2 == 0 { Arm::Active } else { Arm::Placebo };
        for (bit, visit) in VISITS.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                records.push(
                    Record::new(format!("S{i:02}"), *visit, arm)
                        .with_value("HeartRate", 60.0 + i as f64),
                );
            }
        }
    }
    records
}

fn schedule() -> VisitSchedule {
    VisitSchedule::new(VISITS).expect("valid schedule")
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 512,
        .. ProptestConfig::default()
    })]

    #[test]
    fn schedule_ordered_records_form_a_valid_cohort(masks in visit_masks()) {
        let records = records_for(&masks);
        let n_records = records.len();
        let cohort = Cohort::new(schedule(), vec!["HeartRate".to_string()], records)
            .expect("ordered records should validate");
        prop_assert_eq!(cohort.len(), n_records);
        prop_assert_eq!(cohort.arm_counts().total(), masks.len());
        prop_assert!(cohort.is_arm_balanced());
        prop_assert_eq!(cohort.subjects().len(), masks.len());
    }

    #[test]
    fn reversed_visits_are_rejected(masks in visit_masks()) {
        prop_assume!(masks.iter().any(|mask| mask.count_ones() >= 2));
        let mut records = records_for(&masks);
        let first_multi = masks.iter().position(|mask| mask.count_ones() >= 2)
            .expect("assumed above");
        let subject = format!("S{first_multi:02}");
        let start = records.iter().position(|r| r.subject_id == subject)
            .expect("subject present");
        let len = masks[first_multi].count_ones() as usize;
        records[start..start + len].reverse();
        let err = Cohort::new(schedule(), vec!["HeartRate".to_string()], records)
            .expect_err("out-of-order visits must fail");
        prop_assert_eq!(err.code(), "invalid_configuration");
    }

    #[test]
    fn rng_streams_are_reproducible_and_distinct(seed in any::<u64>()) {
        let draw = |stream: RngStream| {
            let mut rng = seeded_rng(seed, stream);
            (0..4).map(|_| rng.random::<u64>()).collect::<Vec<_>>()
        };
        prop_assert_eq!(draw(RngStream::Sampling), draw(RngStream::Sampling));
        prop_assert_ne!(draw(RngStream::Sampling), draw(RngStream::Jitter));
        prop_assert_ne!(draw(RngStream::Missingness), draw(RngStream::Masking));
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use libfuzzer_sys::fuzz_target;
use syncoh_eval::{MetricKind, ScoreConfig, score};

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let d = common::bounded(cursor.next_u8(), 1, 4);
    let n_real = common::bounded(cursor.next_u8(), 0, 40);
    let n_synthetic = common::bounded(cursor.next_u8(), 0, 40);
    let config = ScoreConfig {
        k: common::bounded(cursor.next_u8(), 1, 8),
        mask_fraction: 0.05 + f64::from(cursor.next_u8() % 90) / 100.0,
        seed: cursor.next_u64(),
        ..ScoreConfig::default()
    };

    let Some(real) = common::cohort(&mut cursor, d, n_real) else {
        return;
    };
    let Some(synthetic) = common::cohort(&mut cursor, d, n_synthetic) else {
        return;
    };

    if let Ok(report) = score(&real, &synthetic, &config) {
        for kind in MetricKind::ALL {
            let value = report.scores.get(kind);
            assert!((0.0..=1.0).contains(&value), "{} out of range: {value}", kind.as_str());
        }
        assert!((0.0..=1.0).contains(&report.overall_quality));
    }
});

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic fixtures shared by the benchmarks.

use rand::SeedableRng;
use rand::rngs::StdRng;
use syncoh_core::{Arm, Cohort, Record, SyncohError, VisitSchedule};
use syncoh_stats::standard_normal;

pub const BENCH_FIELDS: [&str; 4] = ["SystolicBP", "DiastolicBP", "HeartRate", "Weight"];

/// Correlated vitals for `n_per_arm` subjects per arm over a four-visit schedule.
pub fn reference_cohort(n_per_arm: usize, seed: u64) -> Result<Cohort, SyncohError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let schedule = VisitSchedule::new(["Baseline", "Week 4", "Week 8", "Week 12"])?;
    let mut records = Vec::with_capacity(2 * n_per_arm * schedule.len());
    for arm in Arm::ALL {
        let drift = if arm == Arm::Active { -1.0 } else { -0.2 };
        for i in 0..n_per_arm {
            let id = format!("B-{}-{i:05}", arm.code());
            let latent = standard_normal(&mut rng);
            for (visit_idx, visit) in schedule.iter().enumerate() {
                let z = standard_normal(&mut rng);
                let sbp = 132.0 + 9.0 * latent + 3.0 * z + drift * visit_idx as f64;
                records.push(
                    Record::new(&id, visit, arm)
                        .with_value(BENCH_FIELDS[0], sbp)
                        .with_value(BENCH_FIELDS[1], 0.55 * sbp + 6.0 * standard_normal(&mut rng))
                        .with_value(BENCH_FIELDS[2], 72.0 + 7.0 * standard_normal(&mut rng))
                        .with_value(BENCH_FIELDS[3], 80.0 + 12.0 * latent + z),
                );
            }
        }
    }
    Cohort::new(
        schedule,
        BENCH_FIELDS.iter().map(|f| f.to_string()).collect(),
        records,
    )
}

pub fn crate_name() -> &'static str {
    let _ = (syncoh_core::crate_name(), syncoh_stats::crate_name());
    "syncoh-bench"
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rand::Rng;
use syncoh_core::{MissingMechanism, Record, SyncohError};

/// Nulls generated values in place and returns how many were removed.
///
/// MCAR drops each present value with probability `rate`. MAR leaves the
/// driver field intact and scales the drop probability of every other field
/// by the record's driver rank, `2 * rate * rank / (m + 1)`, so the average
/// rate over ranked records stays `rate`.
pub fn inject_missing(
    records: &mut [Record],
    fields: &[String],
    rate: f64,
    mechanism: &MissingMechanism,
    rng: &mut impl Rng,
) -> Result<usize, SyncohError> {
    if !(0.0..1.0).contains(&rate) {
        return Err(SyncohError::invalid_config(format!(
            "missing_rate must be within [0, 1); got {rate}"
        )));
    }
    if rate == 0.0 {
        return Ok(0);
    }

    match mechanism {
        MissingMechanism::Mcar => {
            let mut removed = 0;
            for record in records.iter_mut() {
                removed += drop_values(record, fields, None, rate, rng);
            }
            Ok(removed)
        }
        MissingMechanism::Mar { driver } => {
            if !fields.iter().any(|field| field == driver) {
                return Err(SyncohError::invalid_config(format!(
                    "MAR driver '{driver}' is not one of the cohort fields"
                )));
            }
            let probabilities = rank_probabilities(records, driver, rate);
            let mut removed = 0;
            for (record, p) in records.iter_mut().zip(probabilities) {
                removed += drop_values(record, fields, Some(driver), p, rng);
            }
            Ok(removed)
        }
    }
}

fn drop_values(
    record: &mut Record,
    fields: &[String],
    keep: Option<&str>,
    p: f64,
    rng: &mut impl Rng,
) -> usize {
    let mut removed = 0;
    for field in fields {
        if keep == Some(field.as_str()) || record.value(field).is_none() {
            continue;
        }
        if rng.random::<f64>() < p {
            record.set_value(field, None);
            removed += 1;
        }
    }
    removed
}

fn rank_probabilities(records: &[Record], driver: &str, rate: f64) -> Vec<f64> {
    let mut ranked = records
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| record.value(driver).map(|value| (value, idx)))
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let m = ranked.len() as f64;
    let mut out = vec![rate; records.len()];
    for (rank0, (_, idx)) in ranked.iter().enumerate() {
        let rank = (rank0 + 1) as f64;
        out[*idx] = (2.0 * rate * rank / (m + 1.0)).min(1.0);
    }
    out
}

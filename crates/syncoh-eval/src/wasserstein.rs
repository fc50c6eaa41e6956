// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::report::{FieldDistance, WassersteinReport};
use syncoh_core::{Cohort, SyncohError};
use syncoh_stats::{ScaleSource, robust_scale, wasserstein_1d};
use tracing::warn;

/// Similarity from a distance normalized by `scale`: `clamp(1 - d / scale, 0, 1)`.
pub fn normalized_similarity(distance: f64, scale: f64) -> f64 {
    (1.0 - distance / scale).clamp(0.0, 1.0)
}

/// Per-field Wasserstein-1 distance over non-missing values, normalized by the
/// real IQR (falling back to the real standard deviation, then 1.0).
pub fn wasserstein_fidelity(
    real: &Cohort,
    synthetic: &Cohort,
) -> Result<WassersteinReport, SyncohError> {
    let mut fields = Vec::with_capacity(real.fields().len());
    for field in real.fields() {
        let real_values = real.column(field);
        let synthetic_values = synthetic.column(field);
        let distance = wasserstein_1d(&real_values, &synthetic_values).ok_or_else(|| {
            SyncohError::insufficient_data(format!(
                "field '{field}' has no observed values in one of the cohorts"
            ))
        })?;
        let scale = robust_scale(&real_values);
        if scale.source == ScaleSource::Unit {
            warn!(field = %field, "real values are constant; using unit scale");
        }
        fields.push(FieldDistance {
            field: field.clone(),
            distance,
            scale: scale.value,
            scale_source: scale.source.as_str().to_string(),
            similarity: normalized_similarity(distance, scale.value),
        });
    }

    let score = fields.iter().map(|f| f.similarity).sum::<f64>() / fields.len().max(1) as f64;
    Ok(WassersteinReport { fields, score })
}

#[cfg(test)]
mod tests {
    use super::{normalized_similarity, wasserstein_fidelity};
    use syncoh_core::{Arm, Cohort, Record, VisitSchedule};

    fn sbp_cohort(values: &[f64]) -> Cohort {
        let schedule = VisitSchedule::new(["Baseline"]).expect("valid schedule");
        let records = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let arm = if i % 2 == 0 { Arm::Active } else { Arm::Placebo };
                Record::new(format!("S{i}"), "Baseline", arm).with_value("SystolicBP", *v)
            })
            .collect();
        Cohort::from_records(schedule, records).expect("valid cohort")
    }

    #[test]
    fn near_identical_distributions_score_high() {
        let real = sbp_cohort(&[120.0, 130.0, 140.0, 150.0]);
        let synthetic = sbp_cohort(&[121.0, 129.0, 141.0, 149.0]);
        let report = wasserstein_fidelity(&real, &synthetic).expect("metric should compute");
        let field = &report.fields[0];
        assert!((field.distance - 1.0).abs() < 1e-12);
        assert!((field.scale - 25.0).abs() < 1e-12);
        assert_eq!(field.scale_source, "iqr");
        assert!(field.similarity > 0.95);
        assert!((report.score - 0.96).abs() < 1e-12);
    }

    #[test]
    fn similarity_is_clamped() {
        assert_eq!(normalized_similarity(0.0, 3.0), 1.0);
        assert_eq!(normalized_similarity(9.0, 3.0), 0.0);
        assert!((normalized_similarity(1.5, 3.0) - 0.5).abs() < 1e-12);
    }
}

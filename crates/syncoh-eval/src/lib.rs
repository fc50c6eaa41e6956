// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Multi-metric fidelity scoring of a synthetic cohort against a real one.

pub mod correlation;
pub mod imputation;
pub mod pca;
pub mod report;
pub mod wasserstein;

pub use correlation::correlation_fidelity;
pub use imputation::{imputation_fidelity, mask_count};
pub use pca::{PCA_VARIANCE_TARGET, pca_fidelity};
pub use report::{
    CorrelationReport, FieldDistance, FieldImputation, Grade, ImputationReport, MetricKind,
    MetricScores, MetricWeights, PcaReport, QualityReport, STRENGTH_THRESHOLD, ScoreConfig,
    WEAKNESS_THRESHOLD, WassersteinReport,
};
pub use wasserstein::{normalized_similarity, wasserstein_fidelity};

use syncoh_core::{Cohort, SyncohError};
use tracing::debug;

/// Scores `synthetic` against `real` on all four sub-metrics and aggregates them.
///
/// Fails with `SchemaMismatch` when the field sets differ and with
/// `InsufficientData` when either cohort has fewer than `k + 1` complete rows.
pub fn score(
    real: &Cohort,
    synthetic: &Cohort,
    config: &ScoreConfig,
) -> Result<QualityReport, SyncohError> {
    config.validate()?;
    real.ensure_same_fields(synthetic)?;

    let fields = real.fields().to_vec();
    let d = fields.len();
    let real_rows = real.complete_rows(&fields);
    let synthetic_rows = synthetic.complete_rows(&fields);
    let required = config.min_complete_rows();
    for (label, rows) in [("real", &real_rows), ("synthetic", &synthetic_rows)] {
        if rows.len() < required {
            return Err(SyncohError::insufficient_data(format!(
                "{label} cohort has {} complete rows; scoring with k={} needs >= {required}",
                rows.len(),
                config.k
            )));
        }
    }

    let wasserstein = wasserstein_fidelity(real, synthetic)?;
    let correlation = correlation_fidelity(&real_rows, &synthetic_rows, d);
    let pca = pca_fidelity(&real_rows, &synthetic_rows, d)?;
    let imputation = imputation_fidelity(
        &fields,
        &real_rows,
        &synthetic_rows,
        config.k,
        config.mask_fraction,
        config.seed,
    )?;

    let scores = MetricScores {
        wasserstein: wasserstein.score,
        correlation: correlation.score,
        pca: pca.score,
        imputation: imputation.score,
    };
    let overall_quality = config.weights.combine(&scores);
    let quality_grade = Grade::from_score(overall_quality);
    debug!(
        wasserstein = scores.wasserstein,
        correlation = scores.correlation,
        pca = scores.pca,
        imputation = scores.imputation,
        overall_quality,
        grade = quality_grade.as_str(),
        "scored synthetic cohort"
    );

    Ok(QualityReport {
        strengths: scores.strengths(),
        weaknesses: scores.weaknesses(),
        wasserstein,
        correlation,
        pca,
        imputation,
        scores,
        overall_quality,
        quality_grade,
        weights: config.weights,
        n_real_rows: real_rows.len(),
        n_synthetic_rows: synthetic_rows.len(),
    })
}

pub fn crate_name() -> &'static str {
    let _ = (syncoh_core::crate_name(), syncoh_stats::crate_name());
    "syncoh-eval"
}

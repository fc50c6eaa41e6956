// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::report::PcaReport;
use crate::wasserstein::normalized_similarity;
use syncoh_core::SyncohError;
use syncoh_stats::{pearson_correlation_matrix, robust_scale, symmetric_eigen, wasserstein_1d};

/// Cumulative explained variance the retained components must reach.
pub const PCA_VARIANCE_TARGET: f64 = 0.90;
const SCALE_EPSILON: f64 = 1.0e-12;

fn column_stats(rows: &[Vec<f64>], d: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len() as f64;
    let means = (0..d)
        .map(|j| rows.iter().map(|row| row[j]).sum::<f64>() / n)
        .collect::<Vec<_>>();
    let stds = (0..d)
        .map(|j| {
            let ss = rows
                .iter()
                .map(|row| (row[j] - means[j]) * (row[j] - means[j]))
                .sum::<f64>();
            let sd = (ss / (n - 1.0).max(1.0)).sqrt();
            if sd > SCALE_EPSILON { sd } else { 1.0 }
        })
        .collect::<Vec<_>>();
    (means, stds)
}

fn project(rows: &[Vec<f64>], means: &[f64], stds: &[f64], axis: &[f64]) -> Vec<f64> {
    rows.iter()
        .map(|row| {
            row.iter()
                .zip(means.iter().zip(stds))
                .zip(axis)
                .map(|((x, (mu, sd)), w)| w * (x - mu) / sd)
                .sum::<f64>()
        })
        .collect()
}

/// Principal-subspace fidelity.
///
/// Both cohorts are standardized with the real means and deviations and
/// projected on the leading eigenvectors of the real correlation matrix (enough
/// to explain [`PCA_VARIANCE_TARGET`] of the variance). Each component scores
/// `clamp(1 - W1 / IQR_real, 0, 1)`; the metric is their mean.
pub fn pca_fidelity(
    real_rows: &[Vec<f64>],
    synthetic_rows: &[Vec<f64>],
    d: usize,
) -> Result<PcaReport, SyncohError> {
    if d < 2 {
        return Ok(PcaReport {
            score: 0.0,
            components_used: 0,
            explained_variance: vec![],
            component_similarity: vec![],
            axis_alignment: vec![],
        });
    }

    let (means, stds) = column_stats(real_rows, d);
    let real_eigen = symmetric_eigen(&pearson_correlation_matrix(real_rows, d), d)?;
    let total = real_eigen.values.iter().map(|v| v.max(0.0)).sum::<f64>();
    let explained_variance = real_eigen
        .values
        .iter()
        .map(|v| if total > 0.0 { v.max(0.0) / total } else { 0.0 })
        .collect::<Vec<_>>();

    let mut components_used = d;
    let mut cumulative = 0.0;
    for (idx, ratio) in explained_variance.iter().enumerate() {
        cumulative += ratio;
        if cumulative >= PCA_VARIANCE_TARGET - 1e-12 {
            components_used = idx + 1;
            break;
        }
    }

    let component_similarity = real_eigen.vectors[..components_used]
        .iter()
        .map(|axis| {
            let real_proj = project(real_rows, &means, &stds, axis);
            let synthetic_proj = project(synthetic_rows, &means, &stds, axis);
            let distance = wasserstein_1d(&real_proj, &synthetic_proj).ok_or_else(|| {
                SyncohError::insufficient_data("PCA projection requires non-empty cohorts")
            })?;
            Ok(normalized_similarity(distance, robust_scale(&real_proj).value))
        })
        .collect::<Result<Vec<_>, SyncohError>>()?;

    let axis_alignment = match symmetric_eigen(&pearson_correlation_matrix(synthetic_rows, d), d) {
        Ok(synthetic_eigen) => real_eigen.vectors[..components_used]
            .iter()
            .zip(&synthetic_eigen.vectors)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>().abs().min(1.0))
            .collect(),
        Err(_) => vec![],
    };

    let score = component_similarity.iter().sum::<f64>() / components_used as f64;
    Ok(PcaReport {
        score,
        components_used,
        explained_variance,
        component_similarity,
        axis_alignment,
    })
}

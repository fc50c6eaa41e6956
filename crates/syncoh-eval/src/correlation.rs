// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::report::CorrelationReport;
use syncoh_stats::pearson_correlation_matrix;

/// `1 - mean |rho_real - rho_synthetic|` over the upper triangle of the
/// Pearson matrices. Rows must list fields in the same order on both sides.
pub fn correlation_fidelity(real_rows: &[Vec<f64>], synthetic_rows: &[Vec<f64>], d: usize) -> CorrelationReport {
    if d < 2 {
        return CorrelationReport {
            score: 1.0,
            mean_abs_difference: 0.0,
            max_abs_difference: 0.0,
            n_pairs: 0,
        };
    }

    let real = pearson_correlation_matrix(real_rows, d);
    let synthetic = pearson_correlation_matrix(synthetic_rows, d);
    let mut total = 0.0;
    let mut max_abs_difference = 0.0f64;
    let mut n_pairs = 0usize;
    for i in 0..d {
        for j in i + 1..d {
            let diff = (real[i * d + j] - synthetic[i * d + j]).abs();
            total += diff;
            max_abs_difference = max_abs_difference.max(diff);
            n_pairs += 1;
        }
    }
    let mean_abs_difference = total / n_pairs as f64;
    CorrelationReport {
        score: (1.0 - mean_abs_difference).clamp(0.0, 1.0),
        mean_abs_difference,
        max_abs_difference,
        n_pairs,
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::bounds::finalize_value;
use syncoh_core::{ClipStats, Estimator, Record, SyncohError};
use syncoh_stats::{idw_knn_predict, mean, solve_linear_system, std_dev};
use tracing::debug;

const CONVERGENCE_TOLERANCE: f64 = 1.0e-6;
const RIDGE: f64 = 1.0e-8;

/// Fills every missing value using `estimator`; returns how many were filled.
///
/// Imputed values go through the same rounding and physiological clipping as
/// sampled values.
pub fn impute(
    records: &mut [Record],
    fields: &[String],
    estimator: Estimator,
    clip: &mut ClipStats,
) -> Result<usize, SyncohError> {
    estimator.validate()?;

    let observed = records
        .iter()
        .map(|record| {
            fields
                .iter()
                .map(|field| record.value(field))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let n_missing = observed
        .iter()
        .map(|row| row.iter().filter(|v| v.is_none()).count())
        .sum::<usize>();
    if n_missing == 0 {
        return Ok(0);
    }

    let means = column_means(&observed, fields)?;
    let filled = match estimator {
        Estimator::Mean => fill_with(&observed, &means),
        Estimator::Knn { k } => knn_fill(&observed, &means, k),
        Estimator::ChainedLinear { max_iter } => chained_linear_fill(&observed, &means, max_iter),
    };

    for (record, (raw, completed)) in records.iter_mut().zip(observed.iter().zip(&filled)) {
        for (j, field) in fields.iter().enumerate() {
            if raw[j].is_none() {
                record.set_value(field, Some(finalize_value(field, completed[j], clip)));
            }
        }
    }
    debug!(
        estimator = estimator.label(),
        values_imputed = n_missing,
        "imputed missing values"
    );
    Ok(n_missing)
}

fn column(observed: &[Vec<Option<f64>>], j: usize) -> Vec<f64> {
    observed.iter().filter_map(|row| row[j]).collect()
}

fn column_means(observed: &[Vec<Option<f64>>], fields: &[String]) -> Result<Vec<f64>, SyncohError> {
    fields
        .iter()
        .enumerate()
        .map(|(j, field)| {
            mean(&column(observed, j)).ok_or_else(|| {
                SyncohError::insufficient_data(format!(
                    "cannot impute '{field}': no observed values"
                ))
            })
        })
        .collect()
}

fn fill_with(observed: &[Vec<Option<f64>>], means: &[f64]) -> Vec<Vec<f64>> {
    observed
        .iter()
        .map(|row| {
            row.iter()
                .zip(means)
                .map(|(value, mu)| value.unwrap_or(*mu))
                .collect()
        })
        .collect()
}

fn knn_fill(observed: &[Vec<Option<f64>>], means: &[f64], k: usize) -> Vec<Vec<f64>> {
    let d = means.len();
    let scales = (0..d)
        .map(|j| {
            std_dev(&column(observed, j))
                .filter(|sd| *sd > f64::EPSILON)
                .unwrap_or(1.0)
        })
        .collect::<Vec<_>>();
    let donors = observed
        .iter()
        .filter_map(|row| row.iter().copied().collect::<Option<Vec<f64>>>())
        .collect::<Vec<_>>();

    let mut out = fill_with(observed, means);
    if donors.is_empty() {
        return out;
    }

    for (row, completed) in observed.iter().zip(out.iter_mut()) {
        let present = (0..d).filter(|&j| row[j].is_some()).collect::<Vec<_>>();
        if present.len() == d || present.is_empty() {
            continue;
        }
        let standardize = |values: &dyn Fn(usize) -> f64| {
            present
                .iter()
                .map(|&j| (values(j) - means[j]) / scales[j])
                .collect::<Vec<_>>()
        };
        let query = standardize(&|j| row[j].unwrap_or(means[j]));
        let train_x = donors
            .iter()
            .map(|donor| standardize(&|j| donor[j]))
            .collect::<Vec<_>>();

        for j in (0..d).filter(|&j| row[j].is_none()) {
            let train_y = donors.iter().map(|donor| donor[j]).collect::<Vec<_>>();
            if let Some(prediction) = idw_knn_predict(&train_x, &train_y, &query, k) {
                completed[j] = prediction;
            }
        }
    }
    out
}

/// Chained equations: start from column means, then repeatedly regress each
/// incomplete field on all others and refresh its missing cells.
fn chained_linear_fill(observed: &[Vec<Option<f64>>], means: &[f64], max_iter: usize) -> Vec<Vec<f64>> {
    let d = means.len();
    let mut current = fill_with(observed, means);
    if d < 2 {
        return current;
    }

    let incomplete = (0..d)
        .filter(|&j| observed.iter().any(|row| row[j].is_none()))
        .collect::<Vec<_>>();

    for _iter in 0..max_iter {
        let mut max_delta = 0.0f64;
        for &target in &incomplete {
            let predictors = (0..d).filter(|&j| j != target).collect::<Vec<_>>();
            let training = observed
                .iter()
                .zip(&current)
                .filter_map(|(row, filled)| {
                    row[target].map(|y| {
                        let x = predictors.iter().map(|&j| filled[j]).collect::<Vec<_>>();
                        (x, y)
                    })
                })
                .collect::<Vec<_>>();
            let Some(coef) = least_squares(&training, predictors.len()) else {
                continue;
            };

            for (row, filled) in observed.iter().zip(current.iter_mut()) {
                if row[target].is_some() {
                    continue;
                }
                let prediction = coef[0]
                    + predictors
                        .iter()
                        .enumerate()
                        .map(|(p, &j)| coef[p + 1] * filled[j])
                        .sum::<f64>();
                if prediction.is_finite() {
                    max_delta = max_delta.max((prediction - filled[target]).abs());
                    filled[target] = prediction;
                }
            }
        }
        if max_delta < CONVERGENCE_TOLERANCE {
            break;
        }
    }
    current
}

/// Ordinary least squares with intercept via lightly ridged normal equations.
fn least_squares(training: &[(Vec<f64>, f64)], p: usize) -> Option<Vec<f64>> {
    if training.len() <= p {
        return None;
    }
    let dim = p + 1;
    let mut xtx = vec![vec![0.0; dim]; dim];
    let mut xty = vec![0.0; dim];
    for (x, y) in training {
        let design = std::iter::once(1.0).chain(x.iter().copied()).collect::<Vec<_>>();
        for a in 0..dim {
            xty[a] += design[a] * y;
            for b in 0..dim {
                xtx[a][b] += design[a] * design[b];
            }
        }
    }
    for (a, row) in xtx.iter_mut().enumerate().skip(1) {
        row[a] += RIDGE * training.len() as f64;
    }
    solve_linear_system(xtx, xty)
}

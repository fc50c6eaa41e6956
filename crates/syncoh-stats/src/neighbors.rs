// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

const EXACT_MATCH_DISTANCE: f64 = 1.0e-12;

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Inverse-distance weighted mean of the `k` nearest training targets.
///
/// Neighbours at (numerically) zero distance take all the weight. Ties in
/// distance resolve by training-row order. `None` when there is nothing to
/// predict from.
pub fn idw_knn_predict(train_x: &[Vec<f64>], train_y: &[f64], query: &[f64], k: usize) -> Option<f64> {
    if k == 0 || train_x.is_empty() || train_x.len() != train_y.len() {
        return None;
    }
    let mut scored = train_x
        .iter()
        .enumerate()
        .map(|(idx, row)| (euclidean(row, query), idx))
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    scored.truncate(k);

    let exact = scored
        .iter()
        .filter(|(dist, _)| *dist <= EXACT_MATCH_DISTANCE)
        .map(|(_, idx)| train_y[*idx])
        .collect::<Vec<_>>();
    if !exact.is_empty() {
        return Some(exact.iter().sum::<f64>() / exact.len() as f64);
    }

    let mut weight_sum = 0.0;
    let mut acc = 0.0;
    for (dist, idx) in &scored {
        let w = 1.0 / dist;
        weight_sum += w;
        acc += w * train_y[*idx];
    }
    if weight_sum > 0.0 && weight_sum.is_finite() {
        Some(acc / weight_sum)
    } else {
        None
    }
}

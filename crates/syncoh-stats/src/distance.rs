// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::descriptive::{mean, sorted};

/// Wasserstein-1 distance between two empirical distributions.
///
/// Integrates `|F_a(x) - F_b(x)|` between consecutive support points, so the
/// samples may differ in size. Returns `None` when either side is empty.
pub fn wasserstein_1d(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let a = sorted(a);
    let b = sorted(b);
    let mut support = Vec::with_capacity(a.len() + b.len());
    support.extend_from_slice(&a);
    support.extend_from_slice(&b);
    support.sort_by(f64::total_cmp);
    support.dedup();

    let na = a.len() as f64;
    let nb = b.len() as f64;
    let mut i = 0usize;
    let mut j = 0usize;
    let mut total = 0.0;
    for window in support.windows(2) {
        let x = window[0];
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        total += (i as f64 / na - j as f64 / nb).abs() * (window[1] - x);
    }
    Some(total)
}

/// Pearson correlation; zero when either side has no variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    let (Some(mx), Some(my)) = (mean(x), mean(y)) else {
        return 0.0;
    };
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if !denom.is_finite() || denom <= f64::EPSILON * (1.0 + sxx.max(syy)) {
        return 0.0;
    }
    (sxy / denom).clamp(-1.0, 1.0)
}

/// Row-major `d x d` Pearson correlation matrix over complete rows.
pub fn pearson_correlation_matrix(rows: &[Vec<f64>], d: usize) -> Vec<f64> {
    let columns = (0..d)
        .map(|col| rows.iter().map(|row| row[col]).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let mut out = vec![0.0; d * d];
    for i in 0..d {
        out[i * d + i] = 1.0;
        for j in i + 1..d {
            let r = pearson(&columns[i], &columns[j]);
            out[i * d + j] = r;
            out[j * d + i] = r;
        }
    }
    out
}

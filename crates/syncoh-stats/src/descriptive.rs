// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

const SCALE_EPSILON: f64 = 1.0e-12;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance with Bessel correction; `None` below two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mu = mean(values)?;
    let ss = values.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>();
    Some(ss / (values.len() - 1) as f64)
}

pub fn std_dev(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Quantile of already-sorted data using (n+1)p plotting positions,
/// clamped to the sample range.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !p.is_finite() {
        return None;
    }
    let n = sorted.len();
    let h = ((n as f64 + 1.0) * p.clamp(0.0, 1.0)).clamp(1.0, n as f64);
    let lower = h.floor() as usize;
    let frac = h - lower as f64;
    if lower >= n {
        return Some(sorted[n - 1]);
    }
    Some(sorted[lower - 1] + frac * (sorted[lower] - sorted[lower - 1]))
}

pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    quantile_sorted(&sorted(values), p)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

pub fn iqr(values: &[f64]) -> Option<f64> {
    let ordered = sorted(values);
    Some(quantile_sorted(&ordered, 0.75)? - quantile_sorted(&ordered, 0.25)?)
}

/// Which statistic supplied a normalization scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleSource {
    Iqr,
    StdDev,
    Unit,
}

impl ScaleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Iqr => "iqr",
            Self::StdDev => "std_dev",
            Self::Unit => "unit",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scale {
    pub value: f64,
    pub source: ScaleSource,
}

/// IQR when positive, else the standard deviation, else 1.0.
pub fn robust_scale(values: &[f64]) -> Scale {
    if let Some(value) = iqr(values)
        && value > SCALE_EPSILON
    {
        return Scale {
            value,
            source: ScaleSource::Iqr,
        };
    }
    if let Some(value) = std_dev(values)
        && value > SCALE_EPSILON
    {
        return Scale {
            value,
            source: ScaleSource::StdDev,
        };
    }
    Scale {
        value: 1.0,
        source: ScaleSource::Unit,
    }
}

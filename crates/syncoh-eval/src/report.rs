// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use syncoh_core::SyncohError;

pub const DEFAULT_K: usize = 5;
pub const DEFAULT_MASK_FRACTION: f64 = 0.2;
pub const DEFAULT_SCORE_SEED: u64 = 42;
pub const STRENGTH_THRESHOLD: f64 = 0.85;
pub const WEAKNESS_THRESHOLD: f64 = 0.60;
const WEIGHT_SUM_TOLERANCE: f64 = 1.0e-9;

/// The four independent fidelity sub-metrics.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    Wasserstein,
    Correlation,
    Pca,
    Imputation,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        Self::Wasserstein,
        Self::Correlation,
        Self::Pca,
        Self::Imputation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wasserstein => "wasserstein",
            Self::Correlation => "correlation",
            Self::Pca => "pca",
            Self::Imputation => "imputation",
        }
    }
}

/// Letter grade derived from `overall_quality`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    /// `>= 0.90` A, `>= 0.75` B, `>= 0.60` C, otherwise D.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.90 {
            Self::A
        } else if score >= 0.75 {
            Self::B
        } else if score >= 0.60 {
            Self::C
        } else {
            Self::D
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// One score per sub-metric, each in `[0, 1]`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricScores {
    pub wasserstein: f64,
    pub correlation: f64,
    pub pca: f64,
    pub imputation: f64,
}

impl MetricScores {
    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Wasserstein => self.wasserstein,
            MetricKind::Correlation => self.correlation,
            MetricKind::Pca => self.pca,
            MetricKind::Imputation => self.imputation,
        }
    }

    /// Sub-metrics at or above the strength threshold, in `MetricKind::ALL` order.
    pub fn strengths(&self) -> Vec<MetricKind> {
        MetricKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind) >= STRENGTH_THRESHOLD)
            .collect()
    }

    pub fn weaknesses(&self) -> Vec<MetricKind> {
        MetricKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind) < WEAKNESS_THRESHOLD)
            .collect()
    }
}

/// Aggregation weights; must be finite, non-negative, and sum to 1.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricWeights {
    pub wasserstein: f64,
    pub correlation: f64,
    pub pca: f64,
    pub imputation: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            wasserstein: 0.25,
            correlation: 0.25,
            pca: 0.25,
            imputation: 0.25,
        }
    }
}

impl MetricWeights {
    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Wasserstein => self.wasserstein,
            MetricKind::Correlation => self.correlation,
            MetricKind::Pca => self.pca,
            MetricKind::Imputation => self.imputation,
        }
    }

    pub fn validate(&self) -> Result<(), SyncohError> {
        for kind in MetricKind::ALL {
            let w = self.get(kind);
            if !w.is_finite() || w < 0.0 {
                return Err(SyncohError::invalid_config(format!(
                    "weight for {} must be finite and >= 0; got {w}",
                    kind.as_str()
                )));
            }
        }
        let total = MetricKind::ALL.iter().map(|kind| self.get(*kind)).sum::<f64>();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SyncohError::invalid_config(format!(
                "metric weights must sum to 1; got {total}"
            )));
        }
        Ok(())
    }

    /// Weighted sum of sub-scores, clamped to `[0, 1]`.
    pub fn combine(&self, scores: &MetricScores) -> f64 {
        MetricKind::ALL
            .iter()
            .map(|kind| self.get(*kind) * scores.get(*kind))
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }
}

/// Scorer configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreConfig {
    /// Neighbours used by the imputation-utility metric.
    pub k: usize,
    /// Fraction of real complete rows masked per field.
    pub mask_fraction: f64,
    pub seed: u64,
    pub weights: MetricWeights,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            mask_fraction: DEFAULT_MASK_FRACTION,
            seed: DEFAULT_SCORE_SEED,
            weights: MetricWeights::default(),
        }
    }
}

impl ScoreConfig {
    pub fn validate(&self) -> Result<(), SyncohError> {
        if self.k == 0 {
            return Err(SyncohError::invalid_config("ScoreConfig.k must be >= 1"));
        }
        if !(self.mask_fraction > 0.0 && self.mask_fraction < 1.0) {
            return Err(SyncohError::invalid_config(format!(
                "ScoreConfig.mask_fraction must be within (0, 1); got {}",
                self.mask_fraction
            )));
        }
        self.weights.validate()
    }

    /// Complete rows each cohort needs for the configured `k`.
    pub fn min_complete_rows(&self) -> usize {
        self.k + 1
    }
}

/// Per-field distributional distance.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDistance {
    pub field: String,
    pub distance: f64,
    /// Normalizing scale taken from the real values.
    pub scale: f64,
    pub scale_source: String,
    pub similarity: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct WassersteinReport {
    pub fields: Vec<FieldDistance>,
    pub score: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationReport {
    pub score: f64,
    pub mean_abs_difference: f64,
    pub max_abs_difference: f64,
    pub n_pairs: usize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PcaReport {
    pub score: f64,
    pub components_used: usize,
    /// Explained-variance ratio of every real principal component.
    pub explained_variance: Vec<f64>,
    /// Per-component similarity of projected distributions.
    pub component_similarity: Vec<f64>,
    /// `|cos|` between matching real and synthetic principal axes.
    pub axis_alignment: Vec<f64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct FieldImputation {
    pub field: String,
    pub n_masked: usize,
    /// Error of the imputer trained on synthetic rows.
    pub rmse: f64,
    /// Error of the same imputer trained on the real rows.
    pub baseline_rmse: f64,
    pub nrmse: f64,
    /// `max(0, rmse - baseline_rmse) / std_real`.
    pub excess_nrmse: f64,
    pub score: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ImputationReport {
    pub fields: Vec<FieldImputation>,
    pub k: usize,
    pub score: f64,
}

/// Decomposable fidelity verdict for one synthetic cohort.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct QualityReport {
    pub wasserstein: WassersteinReport,
    pub correlation: CorrelationReport,
    pub pca: PcaReport,
    pub imputation: ImputationReport,
    pub scores: MetricScores,
    pub overall_quality: f64,
    pub quality_grade: Grade,
    pub strengths: Vec<MetricKind>,
    pub weaknesses: Vec<MetricKind>,
    pub weights: MetricWeights,
    pub n_real_rows: usize,
    pub n_synthetic_rows: usize,
}

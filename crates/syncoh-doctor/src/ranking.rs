// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::BTreeMap;
use syncoh_core::{Cohort, SyncohError};
use syncoh_eval::{Grade, QualityReport, ScoreConfig, score};
use tracing::{debug, info};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

const MIN_GENERATION_MS: f64 = 0.001;
const WEIGHT_SUM_TOLERANCE: f64 = 1.0e-9;

/// One method's output as handed to the comparator.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct MethodRun {
    pub cohort: Cohort,
    pub generation_time_ms: f64,
    /// Caller-supplied similarity to an external benchmark, in `[0, 1]`.
    pub external_similarity: f64,
}

impl MethodRun {
    pub fn new(cohort: Cohort, generation_time_ms: f64, external_similarity: f64) -> Self {
        Self {
            cohort,
            generation_time_ms,
            external_similarity,
        }
    }

    fn validate(&self, method: &str) -> Result<(), SyncohError> {
        if !self.generation_time_ms.is_finite() || self.generation_time_ms < 0.0 {
            return Err(SyncohError::invalid_config(format!(
                "{method}: generation_time_ms must be finite and >= 0; got {}",
                self.generation_time_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.external_similarity) {
            return Err(SyncohError::invalid_config(format!(
                "{method}: external_similarity must be within [0, 1]; got {}",
                self.external_similarity
            )));
        }
        Ok(())
    }
}

/// Weights of the comparator's composite score.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankingWeights {
    pub quality: f64,
    pub speed: f64,
    pub external: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            quality: 0.5,
            speed: 0.3,
            external: 0.2,
        }
    }
}

impl RankingWeights {
    pub fn validate(&self) -> Result<(), SyncohError> {
        for (name, w) in [
            ("quality", self.quality),
            ("speed", self.speed),
            ("external", self.external),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(SyncohError::invalid_config(format!(
                    "ranking weight {name} must be finite and >= 0; got {w}"
                )));
            }
        }
        let total = self.quality + self.speed + self.external;
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SyncohError::invalid_config(format!(
                "ranking weights must sum to 1; got {total}"
            )));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CompareConfig {
    pub score: ScoreConfig,
    pub weights: RankingWeights,
}

impl CompareConfig {
    pub fn validate(&self) -> Result<(), SyncohError> {
        self.score.validate()?;
        self.weights.validate()
    }
}

/// Scored inputs to [`rank`], one per method.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodMeasurement {
    pub method: String,
    pub overall_quality: f64,
    pub quality_grade: Grade,
    pub records_per_second: f64,
    pub generation_time_ms: f64,
    pub external_similarity: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RankedMethod {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub method: String,
    pub overall_quality: f64,
    pub quality_grade: Grade,
    pub records_per_second: f64,
    pub generation_time_ms: f64,
    pub normalized_speed_rank: f64,
    pub external_similarity: f64,
    pub weighted_score: f64,
}

/// Deltas between two adjacent ranks (higher minus lower).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Tradeoff {
    pub higher: String,
    pub lower: String,
    pub weighted_score_delta: f64,
    pub quality_delta: f64,
    pub speed_rank_delta: f64,
    /// `higher.records_per_second / lower.records_per_second`; 1 when either is zero.
    pub speed_ratio: f64,
    pub external_similarity_delta: f64,
    pub message: String,
}

impl Tradeoff {
    fn between(higher: &RankedMethod, lower: &RankedMethod) -> Self {
        let quality_delta = higher.overall_quality - lower.overall_quality;
        let speed_rank_delta = higher.normalized_speed_rank - lower.normalized_speed_rank;
        let external_similarity_delta = higher.external_similarity - lower.external_similarity;
        let speed_ratio = if higher.records_per_second > 0.0 && lower.records_per_second > 0.0 {
            higher.records_per_second / lower.records_per_second
        } else {
            1.0
        };
        let message = format!(
            "{} ranks above {}: trades {:+.1}% quality for {speed_ratio:.2}x speed (speed rank {speed_rank_delta:+.3}, external similarity {external_similarity_delta:+.3})",
            higher.method,
            lower.method,
            100.0 * quality_delta
        );
        Self {
            higher: higher.method.clone(),
            lower: lower.method.clone(),
            weighted_score_delta: higher.weighted_score - lower.weighted_score,
            quality_delta,
            speed_rank_delta,
            speed_ratio,
            external_similarity_delta,
            message,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RankingReport {
    pub ranked: Vec<RankedMethod>,
    pub recommended_method: String,
    pub tradeoffs: Vec<Tradeoff>,
    /// Full fidelity report per method; empty when produced by [`rank`] directly.
    pub reports: BTreeMap<String, QualityReport>,
}

/// `n_records / seconds`, with the elapsed time floored at 0.001 ms.
pub fn records_per_second(n_records: usize, generation_time_ms: f64) -> f64 {
    n_records as f64 / (generation_time_ms.max(MIN_GENERATION_MS) / 1000.0)
}

fn score_run(
    method: &str,
    run: &MethodRun,
    real: &Cohort,
    config: &ScoreConfig,
) -> Result<(MethodMeasurement, QualityReport), SyncohError> {
    run.validate(method)?;
    let report = score(real, &run.cohort, config)?;
    debug!(
        method,
        overall_quality = report.overall_quality,
        "scored method run"
    );
    let measurement = MethodMeasurement {
        method: method.to_string(),
        overall_quality: report.overall_quality,
        quality_grade: report.quality_grade,
        records_per_second: records_per_second(run.cohort.len(), run.generation_time_ms),
        generation_time_ms: run.generation_time_ms,
        external_similarity: run.external_similarity,
    };
    Ok((measurement, report))
}

/// Scores every run against `real` and ranks the methods.
pub fn compare(
    runs: &BTreeMap<String, MethodRun>,
    real: &Cohort,
    config: &CompareConfig,
) -> Result<RankingReport, SyncohError> {
    config.validate()?;
    if runs.is_empty() {
        return Err(SyncohError::invalid_config(
            "compare requires at least one method run",
        ));
    }

    let entries = runs.iter().collect::<Vec<_>>();
    #[cfg(feature = "rayon")]
    let scored = entries
        .par_iter()
        .map(|(method, run)| score_run(method, run, real, &config.score))
        .collect::<Result<Vec<_>, SyncohError>>()?;
    #[cfg(not(feature = "rayon"))]
    let scored = entries
        .iter()
        .map(|(method, run)| score_run(method, run, real, &config.score))
        .collect::<Result<Vec<_>, SyncohError>>()?;

    let (measurements, reports): (Vec<_>, Vec<_>) = scored.into_iter().unzip();
    let mut report = rank(measurements.clone(), &config.weights)?;
    report.reports = measurements
        .into_iter()
        .map(|m| m.method)
        .zip(reports)
        .collect();
    info!(
        methods = report.ranked.len(),
        recommended = %report.recommended_method,
        "method comparison complete"
    );
    Ok(report)
}

/// Ranks already-scored methods.
///
/// Ordering: weighted score, then overall quality, then records per second
/// (all descending), then method name.
pub fn rank(
    measurements: Vec<MethodMeasurement>,
    weights: &RankingWeights,
) -> Result<RankingReport, SyncohError> {
    weights.validate()?;
    if measurements.is_empty() {
        return Err(SyncohError::invalid_config(
            "ranking requires at least one scored method",
        ));
    }

    let n = measurements.len();
    let speeds = measurements
        .iter()
        .map(|m| m.records_per_second)
        .collect::<Vec<_>>();
    let mut ranked = measurements
        .into_iter()
        .map(|m| {
            let normalized_speed_rank = if n == 1 {
                1.0
            } else {
                let faster = speeds.iter().filter(|s| **s > m.records_per_second).count();
                1.0 - faster as f64 / (n - 1) as f64
            };
            let weighted_score = weights.quality * m.overall_quality
                + weights.speed * normalized_speed_rank
                + weights.external * m.external_similarity;
            RankedMethod {
                rank: 0,
                method: m.method,
                overall_quality: m.overall_quality,
                quality_grade: m.quality_grade,
                records_per_second: m.records_per_second,
                generation_time_ms: m.generation_time_ms,
                normalized_speed_rank,
                external_similarity: m.external_similarity,
                weighted_score,
            }
        })
        .collect::<Vec<_>>();

    ranked.sort_by(ranking_order);
    for (idx, entry) in ranked.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }

    let tradeoffs = ranked
        .windows(2)
        .map(|pair| Tradeoff::between(&pair[0], &pair[1]))
        .collect();
    let recommended_method = ranked[0].method.clone();

    Ok(RankingReport {
        ranked,
        recommended_method,
        tradeoffs,
        reports: BTreeMap::new(),
    })
}

fn ranking_order(a: &RankedMethod, b: &RankedMethod) -> Ordering {
    b.weighted_score
        .total_cmp(&a.weighted_score)
        .then_with(|| b.overall_quality.total_cmp(&a.overall_quality))
        .then_with(|| b.records_per_second.total_cmp(&a.records_per_second))
        .then_with(|| a.method.cmp(&b.method))
}

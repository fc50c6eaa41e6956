// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use syncoh_core::{Arm, Cohort, SyncohError, VisitSchedule};
use syncoh_stats::{covariance_matrix, regularize_covariance};
use tracing::{debug, warn};

pub const DEFAULT_WITHIN_SUBJECT_CORRELATION: f64 = 0.5;
pub const MAX_WITHIN_SUBJECT_CORRELATION: f64 = 0.95;
const MIN_SUBJECTS_PER_GROUP: usize = 2;
const STD_EPSILON: f64 = 1.0e-12;

/// Gaussian summary of one (arm, visit) group of the reference cohort.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct GroupModel {
    pub arm: Arm,
    pub visit: String,
    /// Subjects with a complete row in this group.
    pub n_subjects: usize,
    pub mean: Vec<f64>,
    /// Row-major `d x d`, positive definite after regularization.
    pub covariance: Vec<f64>,
    /// Lower Cholesky factor of `covariance`.
    pub cholesky: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    /// Diagonal load added to make the covariance positive definite.
    pub regularization: f64,
}

impl GroupModel {
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn std_dev(&self, field_idx: usize) -> f64 {
        let d = self.dim();
        self.covariance[field_idx * d + field_idx].max(0.0).sqrt()
    }
}

/// Reference statistical model keyed by (arm, visit).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DistributionModel {
    fields: Vec<String>,
    schedule: VisitSchedule,
    groups: Vec<GroupModel>,
    within_subject_correlation: f64,
    n_reference_subjects: usize,
}

impl DistributionModel {
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn schedule(&self) -> &VisitSchedule {
        &self.schedule
    }

    pub fn groups(&self) -> &[GroupModel] {
        &self.groups
    }

    pub fn within_subject_correlation(&self) -> f64 {
        self.within_subject_correlation
    }

    pub fn n_reference_subjects(&self) -> usize {
        self.n_reference_subjects
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|name| name == field)
    }

    pub fn group(&self, arm: Arm, visit: &str) -> Option<&GroupModel> {
        self.groups
            .iter()
            .find(|group| group.arm == arm && group.visit == visit)
    }

    /// Group for `(arm, visit)`, or the same arm's group at the nearest
    /// scheduled visit (earlier visits win ties).
    pub fn resolve_group(&self, arm: Arm, visit_idx: usize) -> Option<&GroupModel> {
        self.groups
            .iter()
            .filter(|group| group.arm == arm)
            .filter_map(|group| {
                self.schedule
                    .position(&group.visit)
                    .map(|pos| (pos.abs_diff(visit_idx), pos, group))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, _, group)| group)
    }

    /// Structural checks for models loaded from outside this crate.
    pub fn validate(&self) -> Result<(), SyncohError> {
        let d = self.fields.len();
        if d == 0 || self.groups.is_empty() {
            return Err(SyncohError::model_not_fitted(
                "distribution model has no fields or no fitted groups",
            ));
        }
        if !(0.0..1.0).contains(&self.within_subject_correlation) {
            return Err(SyncohError::invalid_config(format!(
                "within_subject_correlation must be within [0, 1); got {}",
                self.within_subject_correlation
            )));
        }
        for group in &self.groups {
            if group.mean.len() != d
                || group.covariance.len() != d * d
                || group.cholesky.len() != d * d
                || group.min.len() != d
                || group.max.len() != d
            {
                return Err(SyncohError::invalid_config(format!(
                    "group ({}, {}) dimensions do not match {d} fields",
                    group.arm.as_str(),
                    group.visit
                )));
            }
            if !self.schedule.contains(&group.visit) {
                return Err(SyncohError::invalid_config(format!(
                    "group visit '{}' is not in the model schedule",
                    group.visit
                )));
            }
        }
        Ok(())
    }
}

/// Fits per-(arm, visit) mean, covariance, and bounds, plus the within-subject correlation.
pub fn fit(reference: &Cohort) -> Result<DistributionModel, SyncohError> {
    if reference.is_empty() {
        return Err(SyncohError::empty_reference(
            "cannot fit a distribution model to an empty cohort",
        ));
    }

    let fields = reference.fields().to_vec();
    let schedule = reference.schedule().clone();
    let d = fields.len();

    let mut grouped: BTreeMap<(Arm, usize), Vec<Vec<f64>>> = BTreeMap::new();
    for record in reference.records() {
        let Some(pos) = schedule.position(&record.visit) else {
            continue;
        };
        let slot = grouped.entry((record.arm, pos)).or_default();
        if let Some(row) = fields
            .iter()
            .map(|field| record.value(field))
            .collect::<Option<Vec<f64>>>()
        {
            slot.push(row);
        }
    }

    let mut groups = Vec::with_capacity(grouped.len());
    for ((arm, pos), rows) in &grouped {
        let visit = schedule.as_slice()[*pos].clone();
        if rows.len() < MIN_SUBJECTS_PER_GROUP {
            return Err(SyncohError::insufficient_data(format!(
                "group ({}, {visit}) has {} complete subject rows; need >= {MIN_SUBJECTS_PER_GROUP}",
                arm.as_str(),
                rows.len()
            )));
        }

        let (mean, raw_cov) = covariance_matrix(rows, d)?;
        let regularized = regularize_covariance(&raw_cov, d)?;
        if regularized.jitter > 0.0 {
            warn!(
                arm = arm.as_str(),
                visit = %visit,
                jitter = regularized.jitter,
                "covariance regularized to positive definite"
            );
        }

        let mut min = vec![f64::INFINITY; d];
        let mut max = vec![f64::NEG_INFINITY; d];
        for row in rows {
            for (j, value) in row.iter().enumerate() {
                min[j] = min[j].min(*value);
                max[j] = max[j].max(*value);
            }
        }

        debug!(
            arm = arm.as_str(),
            visit = %visit,
            n_subjects = rows.len(),
            "fitted group"
        );
        groups.push(GroupModel {
            arm: *arm,
            visit,
            n_subjects: rows.len(),
            mean,
            covariance: regularized.covariance,
            cholesky: regularized.factor,
            min,
            max,
            regularization: regularized.jitter,
        });
    }

    let model = DistributionModel {
        within_subject_correlation: 0.0,
        n_reference_subjects: reference.subjects().len(),
        fields,
        schedule,
        groups,
    };
    let rho = estimate_within_subject_correlation(reference, &model);
    debug!(
        within_subject_correlation = rho,
        groups = model.groups.len(),
        "fitted distribution model"
    );
    Ok(DistributionModel {
        within_subject_correlation: rho,
        ..model
    })
}

/// Mean product of standardized residuals over all visit pairs of each subject.
fn estimate_within_subject_correlation(reference: &Cohort, model: &DistributionModel) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for subject in reference.subjects() {
        let residuals = subject
            .records
            .iter()
            .filter_map(|record| {
                let group = model.group(record.arm, &record.visit)?;
                let standardized = model
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(j, field)| {
                        let sd = group.std_dev(j);
                        record
                            .value(field)
                            .filter(|_| sd > STD_EPSILON)
                            .map(|value| (value - group.mean[j]) / sd)
                    })
                    .collect::<Vec<_>>();
                Some(standardized)
            })
            .collect::<Vec<_>>();

        for i in 0..residuals.len() {
            for j in i + 1..residuals.len() {
                for (a, b) in residuals[i].iter().zip(&residuals[j]) {
                    if let (Some(a), Some(b)) = (a, b) {
                        sum += a * b;
                        count += 1;
                    }
                }
            }
        }
    }

    if count == 0 {
        return DEFAULT_WITHIN_SUBJECT_CORRELATION;
    }
    (sum / count as f64).clamp(0.0, MAX_WITHIN_SUBJECT_CORRELATION)
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::assemble::{Draft, finish, resolve_effect, synthetic_subject_id};
use crate::bounds::finalize_value;
use crate::fit::{DistributionModel, GroupModel};
use crate::generator::{CohortGenerator, GenerationContext, GeneratorMethod};
use std::time::Instant;
use syncoh_core::{
    Arm, GeneratedCohort, GenerationRequest, Record, RngStream, SyncohError, seeded_rng,
};
use syncoh_stats::{lower_mat_vec, standard_normal_vec};
use tracing::debug;

/// Configuration for [`MvnGenerator`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MvnConfig {
    /// Overrides the model's fitted within-subject correlation.
    pub within_subject_correlation: Option<f64>,
}

impl MvnConfig {
    pub fn validate(&self) -> Result<(), SyncohError> {
        if let Some(rho) = self.within_subject_correlation
            && !(0.0..1.0).contains(&rho)
        {
            return Err(SyncohError::invalid_config(format!(
                "MvnConfig.within_subject_correlation must be within [0, 1); got {rho}"
            )));
        }
        Ok(())
    }
}

/// Samples each visit from the fitted group Gaussian, sharing a per-subject
/// latent draw across visits:
/// `x = mu + L (sqrt(rho) z_subject + sqrt(1 - rho) z_visit)`.
#[derive(Clone, Debug, Default)]
pub struct MvnGenerator {
    config: MvnConfig,
}

impl MvnGenerator {
    pub fn new(config: MvnConfig) -> Result<Self, SyncohError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MvnConfig {
        &self.config
    }
}

struct VisitPlan<'m> {
    visit: String,
    group: &'m GroupModel,
    mean: Vec<f64>,
}

fn plan_arm<'m>(
    model: &'m DistributionModel,
    arm: Arm,
    notes: &mut Vec<String>,
) -> Result<Vec<VisitPlan<'m>>, SyncohError> {
    model
        .schedule()
        .iter()
        .enumerate()
        .map(|(idx, visit)| {
            let group = model.resolve_group(arm, idx).ok_or_else(|| {
                SyncohError::model_not_fitted(format!(
                    "distribution model has no fitted groups for arm {}",
                    arm.as_str()
                ))
            })?;
            if group.visit != visit {
                notes.push(format!(
                    "{} {visit} sampled from the {} group",
                    arm.as_str(),
                    group.visit
                ));
            }
            Ok(VisitPlan {
                visit: visit.to_string(),
                group,
                mean: group.mean.clone(),
            })
        })
        .collect()
}

impl CohortGenerator for MvnGenerator {
    fn method(&self) -> GeneratorMethod {
        GeneratorMethod::Mvn
    }

    fn generate(
        &self,
        request: &GenerationRequest,
        context: &GenerationContext<'_>,
    ) -> Result<GeneratedCohort, SyncohError> {
        let started_at = Instant::now();
        request.validate()?;
        self.config.validate()?;
        let model = context.model.ok_or_else(|| {
            SyncohError::model_not_fitted(
                "MVN generation requires a fitted distribution model; run fit on a reference cohort first",
            )
        })?;
        model.validate()?;

        let fields = model.fields().to_vec();
        let d = fields.len();
        let effect = resolve_effect(request, &fields)?;
        let rho = self
            .config
            .within_subject_correlation
            .unwrap_or(model.within_subject_correlation());
        let (subject_weight, visit_weight) = (rho.sqrt(), (1.0 - rho).sqrt());

        let mut draft = Draft::new(
            model.schedule().clone(),
            fields.clone(),
            2 * request.n_per_arm * model.schedule().len(),
        );
        let mut active = plan_arm(model, Arm::Active, &mut draft.notes)?;
        let placebo = plan_arm(model, Arm::Placebo, &mut draft.notes)?;

        if let Some((idx, target)) = effect {
            let terminal = model.schedule().terminal_index();
            let placebo_mean = placebo[terminal].mean[idx];
            active[terminal].mean[idx] = placebo_mean + target;
            draft.notes.push(format!(
                "active terminal {} mean set to {:.3} (placebo {:.3} + target {target})",
                fields[idx],
                placebo_mean + target,
                placebo_mean
            ));
        }
        draft
            .notes
            .push(format!("within_subject_correlation={rho:.3}"));

        let mut rng = seeded_rng(request.seed, RngStream::Sampling);
        for (arm, plan) in [(Arm::Active, &active), (Arm::Placebo, &placebo)] {
            for ordinal in 0..request.n_per_arm {
                let subject_id = synthetic_subject_id(arm, ordinal);
                let z_subject = standard_normal_vec(&mut rng, d);
                for visit in plan {
                    let z_visit = standard_normal_vec(&mut rng, d);
                    let combined = z_subject
                        .iter()
                        .zip(&z_visit)
                        .map(|(s, v)| subject_weight * s + visit_weight * v)
                        .collect::<Vec<_>>();
                    let deviation = lower_mat_vec(&visit.group.cholesky, d, &combined);

                    let mut record = Record::new(&subject_id, &visit.visit, arm);
                    for (j, field) in fields.iter().enumerate() {
                        let raw = visit.mean[j] + deviation[j];
                        let value = finalize_value(field, raw, &mut draft.clip);
                        record.values.insert(field.clone(), Some(value));
                    }
                    draft.records.push(record);
                }
            }
        }
        debug!(records = draft.records.len(), rho, "mvn sampling complete");

        finish(GeneratorMethod::Mvn, request, draft, started_at)
    }
}

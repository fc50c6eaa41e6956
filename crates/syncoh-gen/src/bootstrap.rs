// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::assemble::{Draft, finish, resolve_effect, synthetic_subject_id};
use crate::bounds::finalize_value;
use crate::generator::{CohortGenerator, GenerationContext, GeneratorMethod};
use rand::Rng;
use std::time::Instant;
use syncoh_core::{
    Arm, Cohort, GeneratedCohort, GenerationRequest, Record, RngStream, Subject, SyncohError,
    seeded_rng,
};
use syncoh_stats::{mean, normal, std_dev};
use tracing::warn;

/// Resamples whole reference subjects within arm and perturbs every present
/// value with Gaussian noise of scale `jitter_frac * field_std`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BootstrapGenerator;

fn terminal_mean(reference: &Cohort, arm: Arm, field: &str) -> Option<f64> {
    let terminal = reference.schedule().terminal();
    let values = reference
        .records()
        .iter()
        .filter(|record| record.arm == arm && record.visit == terminal)
        .filter_map(|record| record.value(field))
        .collect::<Vec<_>>();
    mean(&values)
}

impl CohortGenerator for BootstrapGenerator {
    fn method(&self) -> GeneratorMethod {
        GeneratorMethod::Bootstrap
    }

    fn generate(
        &self,
        request: &GenerationRequest,
        context: &GenerationContext<'_>,
    ) -> Result<GeneratedCohort, SyncohError> {
        let started_at = Instant::now();
        request.validate()?;
        let reference = context.reference.ok_or_else(|| {
            SyncohError::empty_reference("bootstrap generation requires a reference cohort")
        })?;
        if reference.is_empty() {
            return Err(SyncohError::empty_reference(
                "bootstrap generation requires a non-empty reference cohort",
            ));
        }

        let subjects = reference.subjects();
        let pools = Arm::ALL.map(|arm| {
            subjects
                .iter()
                .filter(|subject| subject.arm == arm)
                .collect::<Vec<&Subject<'_>>>()
        });
        for (arm, pool) in Arm::ALL.iter().zip(&pools) {
            if pool.is_empty() {
                return Err(SyncohError::empty_reference(format!(
                    "reference cohort has no {} subjects to resample",
                    arm.as_str()
                )));
            }
        }

        let fields = reference.fields().to_vec();
        let effect = resolve_effect(request, &fields)?;
        let jitter_sd = fields
            .iter()
            .map(|field| request.jitter_frac * std_dev(&reference.column(field)).unwrap_or(0.0))
            .collect::<Vec<_>>();

        let schedule = reference.schedule().clone();
        let terminal = schedule.terminal().to_string();
        let capacity = 2 * request.n_per_arm * schedule.len();
        let mut draft = Draft::new(schedule, fields.clone(), capacity);

        let shift = match effect {
            Some((idx, target)) => {
                let field = &fields[idx];
                let observed = match (
                    terminal_mean(reference, Arm::Active, field),
                    terminal_mean(reference, Arm::Placebo, field),
                ) {
                    (Some(active), Some(placebo)) => active - placebo,
                    _ => {
                        warn!(field = %field, "reference lacks terminal values for one arm");
                        draft.warnings.push(format!(
                            "reference terminal difference for {field} unavailable; assumed 0"
                        ));
                        0.0
                    }
                };
                draft.notes.push(format!(
                    "active terminal {field} shifted by {:.3} (target {target}, reference diff {observed:.3})",
                    target - observed
                ));
                Some((idx, target - observed))
            }
            None => None,
        };
        draft.notes.push(format!("jitter_frac={}", request.jitter_frac));

        let mut sample_rng = seeded_rng(request.seed, RngStream::Sampling);
        let mut jitter_rng = seeded_rng(request.seed, RngStream::Jitter);
        for (arm, pool) in Arm::ALL.into_iter().zip(&pools) {
            for ordinal in 0..request.n_per_arm {
                let source = pool[sample_rng.random_range(0..pool.len())];
                let subject_id = synthetic_subject_id(arm, ordinal);
                for template in &source.records {
                    let shifted_visit = arm == Arm::Active && template.visit == terminal;
                    let mut record = Record::new(&subject_id, &template.visit, arm);
                    for (j, field) in fields.iter().enumerate() {
                        let value = template.value(field).map(|observed| {
                            let mut raw = normal(&mut jitter_rng, observed, jitter_sd[j]);
                            if let Some((idx, delta)) = shift
                                && shifted_visit
                                && idx == j
                            {
                                raw += delta;
                            }
                            finalize_value(field, raw, &mut draft.clip)
                        });
                        record.values.insert(field.clone(), value);
                    }
                    draft.records.push(record);
                }
            }
        }

        finish(GeneratorMethod::Bootstrap, request, draft, started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::BootstrapGenerator;
    use crate::generator::{CohortGenerator, GenerationContext};
    use syncoh_core::{Arm, Cohort, GenerationRequest, Record, VisitSchedule};

    fn reference(arms: &[Arm]) -> Cohort {
        let schedule = VisitSchedule::new(["Baseline", "Week 8"]).expect("valid schedule");
        let mut records = Vec::new();
        for &arm in arms {
            let base = if arm == Arm::Active { 128.0 } else { 131.0 };
            for i in 0..10 {
                let id = format!("R-{}-{i}", arm.code());
                let sbp = base + (i % 3) as f64 * 0.4;
                records.push(Record::new(&id, "Baseline", arm).with_value("SystolicBP", sbp + 4.0));
                records.push(Record::new(&id, "Week 8", arm).with_value("SystolicBP", sbp));
            }
        }
        Cohort::new(schedule, vec!["SystolicBP".to_string()], records).expect("valid cohort")
    }

    #[test]
    fn missing_reference_is_reported() {
        let err = BootstrapGenerator
            .generate(&GenerationRequest::new(3, 1), &GenerationContext::new())
            .expect_err("no reference must fail");
        assert_eq!(err.code(), "empty_reference");

        let placebo_only = reference(&[Arm::Placebo]);
        let context = GenerationContext::new().with_reference(&placebo_only);
        let err = BootstrapGenerator
            .generate(&GenerationRequest::new(3, 1), &context)
            .expect_err("missing arm must fail");
        assert!(err.to_string().contains("Active"));
    }

    #[test]
    fn zero_jitter_reproduces_reference_values() {
        let reference = reference(&Arm::ALL);
        let context = GenerationContext::new().with_reference(&reference);
        let request = GenerationRequest::new(15, 8).with_jitter_frac(0.0);
        let generated = BootstrapGenerator
            .generate(&request, &context)
            .expect("generation should succeed");
        let allowed = reference.column("SystolicBP");
        for record in generated.cohort.records() {
            let value = record.value("SystolicBP").expect("present");
            assert!(allowed.iter().any(|v| (v - value).abs() < 1e-9));
        }
        assert_eq!(generated.cohort.arm_counts().active, 15);
        assert_eq!(generated.cohort.arm_counts().placebo, 15);
    }

    #[test]
    fn target_effect_offsets_reference_difference() {
        let reference = reference(&Arm::ALL);
        let context = GenerationContext::new().with_reference(&reference);
        let request = GenerationRequest::new(80, 21).with_target_effect("SystolicBP", -5.0);
        let generated = BootstrapGenerator
            .generate(&request, &context)
            .expect("generation should succeed");
        let terminal = |arm: Arm| {
            let values = generated
                .cohort
                .records()
                .iter()
                .filter(|r| r.arm == arm && r.visit == "Week 8")
                .filter_map(|r| r.value("SystolicBP"))
                .collect::<Vec<_>>();
            values.iter().sum::<f64>() / values.len() as f64
        };
        let effect = terminal(Arm::Active) - terminal(Arm::Placebo);
        assert!((effect + 5.0).abs() <= 1.0, "effect={effect}");
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::assemble::{Draft, finish, resolve_effect, synthetic_subject_id};
use crate::bounds::finalize_value;
use crate::generator::{CohortGenerator, GenerationContext, GeneratorMethod};
use std::time::Instant;
use syncoh_core::{
    Arm, GeneratedCohort, GenerationRequest, Record, RngStream, SyncohError, seeded_rng,
};
use syncoh_stats::uniform;

/// Draws every field uniformly from a configured range. Independent of any
/// reference data or fitted model.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleBasedGenerator;

impl CohortGenerator for RuleBasedGenerator {
    fn method(&self) -> GeneratorMethod {
        GeneratorMethod::RuleBased
    }

    fn generate(
        &self,
        request: &GenerationRequest,
        context: &GenerationContext<'_>,
    ) -> Result<GeneratedCohort, SyncohError> {
        let started_at = Instant::now();
        request.validate()?;
        let rules = context.rules.ok_or_else(|| {
            SyncohError::invalid_config(
                "rule-based generation requires a range table and visit schedule",
            )
        })?;
        rules.validate()?;

        let fields = rules.ranges.fields();
        let ranges = rules.ranges.iter().map(|(_, range)| range).collect::<Vec<_>>();
        let effect = resolve_effect(request, &fields)?;
        let schedule = rules.schedule.clone();
        let terminal = schedule.terminal_index();

        let capacity = 2 * request.n_per_arm * schedule.len();
        let mut draft = Draft::new(schedule, fields.clone(), capacity);
        if let Some((idx, target)) = effect {
            draft.notes.push(format!(
                "active terminal {} range shifted by {target}",
                fields[idx]
            ));
        }

        let mut rng = seeded_rng(request.seed, RngStream::Sampling);
        for arm in Arm::ALL {
            for ordinal in 0..request.n_per_arm {
                let subject_id = synthetic_subject_id(arm, ordinal);
                for (visit_idx, visit) in rules.schedule.iter().enumerate() {
                    let mut record = Record::new(&subject_id, visit, arm);
                    for (j, field) in fields.iter().enumerate() {
                        let mut range = ranges[j];
                        if let Some((idx, target)) = effect
                            && arm == Arm::Active
                            && visit_idx == terminal
                            && idx == j
                        {
                            range = range.shifted(target);
                        }
                        let raw = uniform(&mut rng, range.min, range.max);
                        let value = finalize_value(field, raw, &mut draft.clip);
                        record.values.insert(field.clone(), Some(value));
                    }
                    draft.records.push(record);
                }
            }
        }

        finish(GeneratorMethod::RuleBased, request, draft, started_at)
    }
}

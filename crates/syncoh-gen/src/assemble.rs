// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::generator::GeneratorMethod;
use crate::impute::impute;
use crate::missing::inject_missing;
use std::borrow::Cow;
use std::time::Instant;
use syncoh_core::{
    Arm, ClipStats, Cohort, GeneratedCohort, GenerationDiagnostics, GenerationRequest,
    MissingMechanism, Record, RngStream, SyncohError, VisitSchedule, seeded_rng,
};
use tracing::{info, warn};

/// Records produced by a generator before post-processing.
#[derive(Debug)]
pub(crate) struct Draft {
    pub schedule: VisitSchedule,
    pub fields: Vec<String>,
    pub records: Vec<Record>,
    pub clip: ClipStats,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

impl Draft {
    pub fn new(schedule: VisitSchedule, fields: Vec<String>, capacity: usize) -> Self {
        Self {
            schedule,
            fields,
            records: Vec::with_capacity(capacity),
            clip: ClipStats::default(),
            notes: vec![],
            warnings: vec![],
        }
    }
}

pub(crate) fn synthetic_subject_id(arm: Arm, ordinal: usize) -> String {
    format!("SYN-{}-{:04}", arm.code(), ordinal + 1)
}

/// Index of the effect field when a target effect was requested.
pub(crate) fn resolve_effect(
    request: &GenerationRequest,
    fields: &[String],
) -> Result<Option<(usize, f64)>, SyncohError> {
    let Some(effect) = request.target_effect else {
        return Ok(None);
    };
    let idx = fields
        .iter()
        .position(|field| *field == request.effect_field)
        .ok_or_else(|| {
            SyncohError::invalid_config(format!(
                "effect_field '{}' is not one of the generated fields [{}]",
                request.effect_field,
                fields.join(", ")
            ))
        })?;
    Ok(Some((idx, effect)))
}

/// Applies missingness and imputation, validates the cohort, and fills diagnostics.
pub(crate) fn finish(
    method: GeneratorMethod,
    request: &GenerationRequest,
    mut draft: Draft,
    started_at: Instant,
) -> Result<GeneratedCohort, SyncohError> {
    let mut diagnostics = GenerationDiagnostics {
        method: Cow::Borrowed(method.as_str()),
        seed: request.seed,
        ..GenerationDiagnostics::default()
    };

    if request.missing_rate > 0.0 {
        let mut rng = seeded_rng(request.seed, RngStream::Missingness);
        diagnostics.missing_injected = inject_missing(
            &mut draft.records,
            &draft.fields,
            request.missing_rate,
            &request.missing_mechanism,
            &mut rng,
        )?;
        diagnostics.missing_mechanism = Some(match &request.missing_mechanism {
            MissingMechanism::Mcar => "mcar".to_string(),
            MissingMechanism::Mar { driver } => format!("mar(driver={driver})"),
        });
    }

    if let Some(estimator) = request.estimator {
        diagnostics.values_imputed =
            impute(&mut draft.records, &draft.fields, estimator, &mut draft.clip)?;
        diagnostics.estimator = Some(estimator.label().to_string());
    }

    if draft.clip.values_clipped > 0 {
        warn!(
            method = method.as_str(),
            clipped = draft.clip.values_clipped,
            checked = draft.clip.values_checked,
            "values clipped to physiological bounds"
        );
        draft.warnings.push(format!(
            "{} of {} values clipped to physiological bounds",
            draft.clip.values_clipped, draft.clip.values_checked
        ));
    }

    let cohort = Cohort::new(draft.schedule, draft.fields, draft.records)?;
    let counts = cohort.check_arm_balance(0)?;

    diagnostics.n_subjects = counts.total();
    diagnostics.n_records = cohort.len();
    diagnostics.clip_rate = draft.clip.rate();
    diagnostics.clip_stats = draft.clip;
    diagnostics.notes = draft.notes;
    diagnostics.warnings = draft.warnings;
    let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
    diagnostics.runtime_ms = Some(runtime_ms);

    info!(
        method = method.as_str(),
        seed = request.seed,
        n_subjects = diagnostics.n_subjects,
        n_records = diagnostics.n_records,
        missing_injected = diagnostics.missing_injected,
        runtime_ms,
        "generated synthetic cohort"
    );
    Ok(GeneratedCohort {
        cohort,
        diagnostics,
    })
}

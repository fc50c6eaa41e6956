// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use syncoh_core::{Cohort, GenerationRequest, SyncohError};
use syncoh_doctor::{CompareConfig, MethodRun, RankingReport, compare};
use syncoh_eval::{QualityReport, ScoreConfig, score};
use syncoh_gen::{
    DistributionModel, GenerationContext, GeneratorMethod, MvnConfig, RuleConfig, fit,
    generate_with,
};
use tracing::info;

/// Inputs for generating every requested method from one reference cohort.
#[derive(Clone, Debug)]
pub struct AutoCompare<'a> {
    pub methods: Vec<GeneratorMethod>,
    pub request: GenerationRequest,
    pub rules: Option<&'a RuleConfig>,
    pub mvn: MvnConfig,
    pub config: CompareConfig,
}

/// Generates a cohort with each method from `real`, then ranks the methods.
///
/// The MVN model is fitted on `real` only when MVN is requested. External
/// similarity is not available here and is recorded as 0 for every method.
pub fn generate_and_compare(
    real: &Cohort,
    plan: &AutoCompare<'_>,
) -> Result<RankingReport, SyncohError> {
    if plan.methods.is_empty() {
        return Err(SyncohError::invalid_config(
            "at least one generation method is required",
        ));
    }
    let model: Option<DistributionModel> = if plan.methods.contains(&GeneratorMethod::Mvn) {
        Some(fit(real)?)
    } else {
        None
    };

    let mut context = GenerationContext::new()
        .with_reference(real)
        .with_mvn_config(plan.mvn);
    if let Some(model) = model.as_ref() {
        context = context.with_model(model);
    }
    if let Some(rules) = plan.rules {
        context = context.with_rules(rules);
    }

    let mut runs = BTreeMap::new();
    for method in &plan.methods {
        let generated = generate_with(*method, &plan.request, &context)?;
        let elapsed_ms = generated.diagnostics.runtime_ms.unwrap_or(0) as f64;
        info!(
            method = method.as_str(),
            records = generated.cohort.len(),
            elapsed_ms,
            "generated comparison candidate"
        );
        runs.insert(
            method.as_str().to_string(),
            MethodRun::new(generated.cohort, elapsed_ms, 0.0),
        );
    }
    compare(&runs, real, &plan.config)
}

/// Parses two cohort JSON documents and scores the second against the first.
pub fn score_json(
    real_json: &str,
    synthetic_json: &str,
    config: &ScoreConfig,
) -> Result<QualityReport, SyncohError> {
    let parse = |raw: &str, label: &str| {
        serde_json::from_str::<Cohort>(raw).map_err(|err| {
            SyncohError::invalid_config(format!("invalid {label} cohort JSON: {err}"))
        })
    };
    let real = parse(real_json, "real")?;
    let synthetic = parse(synthetic_json, "synthetic")?;
    score(&real, &synthetic, config)
}

pub fn crate_name() -> &'static str {
    let _ = (
        syncoh_core::crate_name(),
        syncoh_gen::crate_name(),
        syncoh_eval::crate_name(),
        syncoh_doctor::crate_name(),
    );
    "syncoh-cli"
}

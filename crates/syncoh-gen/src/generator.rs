// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::bootstrap::BootstrapGenerator;
use crate::fit::DistributionModel;
use crate::mvn::{MvnConfig, MvnGenerator};
use crate::ranges::RuleConfig;
use crate::rule::RuleBasedGenerator;
use syncoh_core::{Cohort, GeneratedCohort, GenerationRequest, SyncohError};

/// Generation strategy tag.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeneratorMethod {
    Mvn,
    Bootstrap,
    RuleBased,
}

impl GeneratorMethod {
    pub const ALL: [GeneratorMethod; 3] = [Self::Mvn, Self::Bootstrap, Self::RuleBased];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mvn => "mvn",
            Self::Bootstrap => "bootstrap",
            Self::RuleBased => "rule_based",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SyncohError> {
        match raw.to_ascii_lowercase().replace('-', "_").as_str() {
            "mvn" | "multivariate_normal" => Ok(Self::Mvn),
            "bootstrap" => Ok(Self::Bootstrap),
            "rule_based" | "rules" => Ok(Self::RuleBased),
            _ => Err(SyncohError::invalid_config(format!(
                "unknown generation method '{raw}'; expected one of: mvn, bootstrap, rule_based"
            ))),
        }
    }
}

/// Inputs a generator may draw on beyond the request itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenerationContext<'a> {
    pub reference: Option<&'a Cohort>,
    pub model: Option<&'a DistributionModel>,
    pub rules: Option<&'a RuleConfig>,
    pub mvn: MvnConfig,
}

impl<'a> GenerationContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference(mut self, reference: &'a Cohort) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_model(mut self, model: &'a DistributionModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_rules(mut self, rules: &'a RuleConfig) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_mvn_config(mut self, mvn: MvnConfig) -> Self {
        self.mvn = mvn;
        self
    }
}

/// A synthetic cohort strategy. Implementations own no RNG state; every call
/// seeds fresh generators from `request.seed`.
pub trait CohortGenerator {
    fn method(&self) -> GeneratorMethod;

    fn generate(
        &self,
        request: &GenerationRequest,
        context: &GenerationContext<'_>,
    ) -> Result<GeneratedCohort, SyncohError>;
}

/// Runs the strategy named by `method` against `context`.
pub fn generate_with(
    method: GeneratorMethod,
    request: &GenerationRequest,
    context: &GenerationContext<'_>,
) -> Result<GeneratedCohort, SyncohError> {
    match method {
        GeneratorMethod::Mvn => MvnGenerator::new(context.mvn)?.generate(request, context),
        GeneratorMethod::Bootstrap => BootstrapGenerator.generate(request, context),
        GeneratorMethod::RuleBased => RuleBasedGenerator.generate(request, context),
    }
}

#[cfg(test)]
mod tests {
    use super::GeneratorMethod;

    #[test]
    fn method_tags_round_trip() {
        for method in GeneratorMethod::ALL {
            assert_eq!(
                GeneratorMethod::parse(method.as_str()).expect("known tag"),
                method
            );
        }
        assert_eq!(
            GeneratorMethod::parse("Rule-Based").expect("alias"),
            GeneratorMethod::RuleBased
        );
        assert!(GeneratorMethod::parse("gan").is_err());
    }
}

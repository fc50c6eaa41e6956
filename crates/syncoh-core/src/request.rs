// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::SyncohError;

pub const DEFAULT_N_PER_ARM: usize = 50;
pub const DEFAULT_JITTER_FRAC: f64 = 0.05;
pub const DEFAULT_EFFECT_FIELD: &str = "SystolicBP";
pub const DEFAULT_SEED: u64 = 42;
pub const MAX_N_PER_ARM: usize = 1_000_000;

/// Mechanism used when nulling generated values.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MissingMechanism {
    /// Missing completely at random: every value has the same probability.
    #[default]
    Mcar,
    /// Missing at random: probability rises with the rank of `driver`.
    Mar { driver: String },
}

/// Imputation model used to complete injected missing values.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Estimator {
    /// Column mean of observed values.
    Mean,
    /// Inverse-distance weighted nearest neighbours on the other fields.
    Knn { k: usize },
    /// Chained equations with per-field linear regression, MICE style.
    ChainedLinear { max_iter: usize },
}

impl Estimator {
    pub fn label(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Knn { .. } => "knn",
            Self::ChainedLinear { .. } => "chained_linear",
        }
    }

    /// Parses a CLI-style tag: `mean`, `knn`, `knn:<k>`, `mice`, `chained_linear:<iters>`.
    pub fn parse(raw: &str) -> Result<Self, SyncohError> {
        let lowered = raw.to_ascii_lowercase();
        let (tag, arg) = match lowered.split_once(':') {
            Some((tag, arg)) => (tag.to_string(), Some(arg.to_string())),
            None => (lowered.clone(), None),
        };
        let parse_arg = |default: usize| -> Result<usize, SyncohError> {
            match &arg {
                Some(value) => value.parse::<usize>().map_err(|_| {
                    SyncohError::invalid_config(format!(
                        "estimator '{raw}' expects a non-negative integer argument"
                    ))
                }),
                None => Ok(default),
            }
        };
        let estimator = match tag.as_str() {
            "mean" => Self::Mean,
            "knn" => Self::Knn { k: parse_arg(5)? },
            "mice" | "chained_linear" => Self::ChainedLinear {
                max_iter: parse_arg(10)?,
            },
            _ => {
                return Err(SyncohError::invalid_config(format!(
                    "unknown estimator '{raw}'; expected one of: mean, knn[:k], mice[:iters]"
                )));
            }
        };
        estimator.validate()?;
        Ok(estimator)
    }

    pub fn validate(self) -> Result<(), SyncohError> {
        match self {
            Self::Mean => Ok(()),
            Self::Knn { k } if k == 0 => Err(SyncohError::invalid_config(
                "estimator knn requires k >= 1",
            )),
            Self::ChainedLinear { max_iter } if max_iter == 0 => Err(
                SyncohError::invalid_config("estimator chained_linear requires max_iter >= 1"),
            ),
            Self::Knn { .. } | Self::ChainedLinear { .. } => Ok(()),
        }
    }
}

/// Options shared by every generator strategy.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    /// Subjects generated per arm.
    pub n_per_arm: usize,
    /// Desired Active minus Placebo mean difference at the terminal visit.
    pub target_effect: Option<f64>,
    /// Field the target effect applies to.
    pub effect_field: String,
    pub seed: u64,
    /// Bootstrap noise scale as a fraction of the per-field standard deviation.
    pub jitter_frac: f64,
    /// Fraction of generated values nulled after sampling.
    pub missing_rate: f64,
    pub missing_mechanism: MissingMechanism,
    pub estimator: Option<Estimator>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            n_per_arm: DEFAULT_N_PER_ARM,
            target_effect: None,
            effect_field: DEFAULT_EFFECT_FIELD.to_string(),
            seed: DEFAULT_SEED,
            jitter_frac: DEFAULT_JITTER_FRAC,
            missing_rate: 0.0,
            missing_mechanism: MissingMechanism::Mcar,
            estimator: None,
        }
    }
}

impl GenerationRequest {
    pub fn new(n_per_arm: usize, seed: u64) -> Self {
        Self {
            n_per_arm,
            seed,
            ..Self::default()
        }
    }

    pub fn with_target_effect(mut self, field: impl Into<String>, effect: f64) -> Self {
        self.effect_field = field.into();
        self.target_effect = Some(effect);
        self
    }

    pub fn with_jitter_frac(mut self, jitter_frac: f64) -> Self {
        self.jitter_frac = jitter_frac;
        self
    }

    pub fn with_missingness(mut self, rate: f64, mechanism: MissingMechanism) -> Self {
        self.missing_rate = rate;
        self.missing_mechanism = mechanism;
        self
    }

    pub fn with_estimator(mut self, estimator: Estimator) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Validates ranges that do not depend on the reference data.
    pub fn validate(&self) -> Result<(), SyncohError> {
        if self.n_per_arm == 0 {
            return Err(SyncohError::invalid_config(
                "GenerationRequest.n_per_arm must be >= 1; got 0",
            ));
        }
        if self.n_per_arm > MAX_N_PER_ARM {
            return Err(SyncohError::invalid_config(format!(
                "GenerationRequest.n_per_arm must be <= {MAX_N_PER_ARM}; got {}",
                self.n_per_arm
            )));
        }
        if let Some(effect) = self.target_effect
            && !effect.is_finite()
        {
            return Err(SyncohError::invalid_config(format!(
                "GenerationRequest.target_effect must be finite; got {effect}"
            )));
        }
        if self.effect_field.trim().is_empty() {
            return Err(SyncohError::invalid_config(
                "GenerationRequest.effect_field must not be blank",
            ));
        }
        if !self.jitter_frac.is_finite() || self.jitter_frac < 0.0 {
            return Err(SyncohError::invalid_config(format!(
                "GenerationRequest.jitter_frac must be finite and >= 0; got {}",
                self.jitter_frac
            )));
        }
        if !self.missing_rate.is_finite() || !(0.0..1.0).contains(&self.missing_rate) {
            return Err(SyncohError::invalid_config(format!(
                "GenerationRequest.missing_rate must be within [0, 1); got {}",
                self.missing_rate
            )));
        }
        if let MissingMechanism::Mar { driver } = &self.missing_mechanism
            && driver.trim().is_empty()
        {
            return Err(SyncohError::invalid_config(
                "MissingMechanism::Mar requires a non-blank driver field",
            ));
        }
        if let Some(estimator) = self.estimator {
            estimator.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Estimator, GenerationRequest, MissingMechanism};

    #[test]
    fn default_request_is_valid() {
        let request = GenerationRequest::default();
        request.validate().expect("default request should validate");
        assert_eq!(request.jitter_frac, 0.05);
        assert_eq!(request.effect_field, "SystolicBP");
    }

    #[test]
    fn validate_rejects_out_of_range_parameters() {
        let cases = [
            (GenerationRequest::new(0, 1), "n_per_arm must be >= 1"),
            (
                GenerationRequest::new(10, 1).with_jitter_frac(-0.1),
                "jitter_frac must be finite and >= 0",
            ),
            (
                GenerationRequest::new(10, 1).with_missingness(1.0, MissingMechanism::Mcar),
                "missing_rate must be within [0, 1)",
            ),
            (
                GenerationRequest::new(10, 1).with_target_effect("SystolicBP", f64::NAN),
                "target_effect must be finite",
            ),
            (
                GenerationRequest::new(10, 1).with_missingness(
                    0.1,
                    MissingMechanism::Mar {
                        driver: " ".to_string(),
                    },
                ),
                "non-blank driver",
            ),
        ];
        for (request, needle) in cases {
            let err = request.validate().expect_err("request should be rejected");
            assert_eq!(err.code(), "invalid_configuration");
            assert!(err.to_string().contains(needle), "unexpected error: {err}");
        }
    }

    #[test]
    fn estimator_parse_supports_arguments() {
        assert_eq!(Estimator::parse("mean").ok(), Some(Estimator::Mean));
        assert_eq!(Estimator::parse("KNN").ok(), Some(Estimator::Knn { k: 5 }));
        assert_eq!(Estimator::parse("knn:3").ok(), Some(Estimator::Knn { k: 3 }));
        assert_eq!(
            Estimator::parse("mice").ok(),
            Some(Estimator::ChainedLinear { max_iter: 10 })
        );
        assert!(Estimator::parse("knn:0").is_err());
        assert!(Estimator::parse("random_forest").is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn request_deserializes_with_defaults() {
        let request: GenerationRequest =
            serde_json::from_str(r#"{"n_per_arm": 12, "target_effect": -5.0}"#)
                .expect("partial request should deserialize");
        assert_eq!(request.n_per_arm, 12);
        assert_eq!(request.target_effect, Some(-5.0));
        assert_eq!(request.seed, 42);
        assert_eq!(request.missing_mechanism, MissingMechanism::Mcar);
    }
}

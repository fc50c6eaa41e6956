// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

/// Errors raised by fitting, generation, scoring, and comparison.
///
/// Every variant carries a message naming the violated precondition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncohError {
    /// Too few subjects or rows for a statistical operation.
    InsufficientData(String),
    /// The MVN generator was invoked without a fitted model.
    ModelNotFitted(String),
    /// The bootstrap generator was given no reference subjects.
    EmptyReference(String),
    /// Two cohorts do not share the same numeric field set.
    SchemaMismatch(String),
    /// Out-of-range request or configuration parameters.
    InvalidConfiguration(String),
    /// A numeric routine failed even after regularization.
    NumericalIssue(String),
}

impl SyncohError {
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn model_not_fitted(msg: impl Into<String>) -> Self {
        Self::ModelNotFitted(msg.into())
    }

    pub fn empty_reference(msg: impl Into<String>) -> Self {
        Self::EmptyReference(msg.into())
    }

    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    /// Stable snake_case tag used in structured error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientData(_) => "insufficient_data",
            Self::ModelNotFitted(_) => "model_not_fitted",
            Self::EmptyReference(_) => "empty_reference",
            Self::SchemaMismatch(_) => "schema_mismatch",
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::NumericalIssue(_) => "numerical_issue",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InsufficientData(msg)
            | Self::ModelNotFitted(msg)
            | Self::EmptyReference(msg)
            | Self::SchemaMismatch(msg)
            | Self::InvalidConfiguration(msg)
            | Self::NumericalIssue(msg) => msg,
        }
    }
}

impl fmt::Display for SyncohError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData(msg) => write!(f, "insufficient data: {msg}"),
            Self::ModelNotFitted(msg) => write!(f, "model not fitted: {msg}"),
            Self::EmptyReference(msg) => write!(f, "empty reference: {msg}"),
            Self::SchemaMismatch(msg) => write!(f, "schema mismatch: {msg}"),
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::NumericalIssue(msg) => write!(f, "numerical issue: {msg}"),
        }
    }
}

impl std::error::Error for SyncohError {}

#[cfg(test)]
mod tests {
    use super::SyncohError;

    #[test]
    fn display_prefixes_kind_and_keeps_message() {
        let err = SyncohError::insufficient_data("group (Active, Baseline) has 1 subject");
        assert_eq!(
            err.to_string(),
            "insufficient data: group (Active, Baseline) has 1 subject"
        );
        assert_eq!(err.message(), "group (Active, Baseline) has 1 subject");
    }

    #[test]
    fn codes_are_stable_snake_case() {
        let cases = [
            (SyncohError::insufficient_data("x"), "insufficient_data"),
            (SyncohError::model_not_fitted("x"), "model_not_fitted"),
            (SyncohError::empty_reference("x"), "empty_reference"),
            (SyncohError::schema_mismatch("x"), "schema_mismatch"),
            (SyncohError::invalid_config("x"), "invalid_configuration"),
            (SyncohError::numerical_issue("x"), "numerical_issue"),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::SyncohError;
use std::collections::BTreeMap;

/// Treatment arm. Trials modeled here always have exactly two arms.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Arm {
    Active,
    Placebo,
}

impl Arm {
    pub const ALL: [Arm; 2] = [Arm::Active, Arm::Placebo];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Placebo => "Placebo",
        }
    }

    /// Single-letter code used in synthetic subject ids.
    pub fn code(self) -> char {
        match self {
            Self::Active => 'A',
            Self::Placebo => 'P',
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SyncohError> {
        match raw.to_ascii_lowercase().as_str() {
            "active" | "treatment" => Ok(Self::Active),
            "placebo" | "control" => Ok(Self::Placebo),
            _ => Err(SyncohError::invalid_config(format!(
                "unknown treatment arm '{raw}'; expected Active or Placebo"
            ))),
        }
    }
}

/// One subject-visit observation with field-keyed numeric values.
///
/// `None` marks a missing value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub subject_id: String,
    #[cfg_attr(feature = "serde", serde(rename = "visit_name"))]
    pub visit: String,
    #[cfg_attr(feature = "serde", serde(rename = "treatment_arm"))]
    pub arm: Arm,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub values: BTreeMap<String, Option<f64>>,
}

impl Record {
    pub fn new(subject_id: impl Into<String>, visit: impl Into<String>, arm: Arm) -> Self {
        Self {
            subject_id: subject_id.into(),
            visit: visit.into(),
            arm,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter for a present value.
    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), Some(value));
        self
    }

    /// Builder-style setter for a missing value.
    pub fn with_missing(mut self, field: impl Into<String>) -> Self {
        self.values.insert(field.into(), None);
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }

    pub fn set_value(&mut self, field: &str, value: Option<f64>) {
        if let Some(slot) = self.values.get_mut(field) {
            *slot = value;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.values.values().all(Option::is_some)
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::SyncohError;
use std::collections::BTreeSet;

/// Therapeutic indication used to select built-in schedules and ranges.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Indication {
    Hypertension,
    Diabetes,
    Oncology,
    #[default]
    General,
}

impl Indication {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hypertension => "hypertension",
            Self::Diabetes => "diabetes",
            Self::Oncology => "oncology",
            Self::General => "general",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SyncohError> {
        match raw.to_ascii_lowercase().as_str() {
            "hypertension" => Ok(Self::Hypertension),
            "diabetes" => Ok(Self::Diabetes),
            "oncology" => Ok(Self::Oncology),
            "general" => Ok(Self::General),
            _ => Err(SyncohError::invalid_config(format!(
                "unknown indication '{raw}'; expected one of: hypertension, diabetes, oncology, general"
            ))),
        }
    }

    fn visit_names(self) -> &'static [&'static str] {
        match self {
            Self::Hypertension => &["Screening", "Baseline", "Week 4", "Week 8", "Week 12"],
            Self::Diabetes => &["Screening", "Baseline", "Week 4", "Week 12", "Week 26"],
            Self::Oncology => &[
                "Screening",
                "Cycle 1 Day 1",
                "Cycle 2 Day 1",
                "Cycle 3 Day 1",
                "End of Treatment",
            ],
            Self::General => &["Baseline", "Week 4", "Week 8", "Week 12"],
        }
    }
}

/// Canonical, ordered visit schedule. The last visit is the terminal visit.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<String>", into = "Vec<String>")
)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VisitSchedule {
    visits: Vec<String>,
}

impl VisitSchedule {
    /// Builds a schedule, rejecting empty, blank, or duplicated visit names.
    pub fn new<I, S>(visits: I) -> Result<Self, SyncohError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let visits = visits.into_iter().map(Into::into).collect::<Vec<String>>();
        if visits.is_empty() {
            return Err(SyncohError::invalid_config(
                "visit schedule must contain at least one visit",
            ));
        }
        let mut seen = BTreeSet::new();
        for (idx, visit) in visits.iter().enumerate() {
            if visit.trim().is_empty() {
                return Err(SyncohError::invalid_config(format!(
                    "visit schedule entry {idx} is blank"
                )));
            }
            if !seen.insert(visit.as_str()) {
                return Err(SyncohError::invalid_config(format!(
                    "visit schedule contains duplicate visit '{visit}'"
                )));
            }
        }
        Ok(Self { visits })
    }

    /// Built-in schedule for an indication.
    pub fn for_indication(indication: Indication) -> Self {
        Self {
            visits: indication
                .visit_names()
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.visits
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.visits.iter().map(String::as_str)
    }

    pub fn position(&self, visit: &str) -> Option<usize> {
        self.visits.iter().position(|candidate| candidate == visit)
    }

    pub fn contains(&self, visit: &str) -> bool {
        self.position(visit).is_some()
    }

    pub fn terminal(&self) -> &str {
        // Non-empty by construction.
        self.visits.last().map(String::as_str).unwrap_or_default()
    }

    pub fn terminal_index(&self) -> usize {
        self.visits.len().saturating_sub(1)
    }
}

impl TryFrom<Vec<String>> for VisitSchedule {
    type Error = SyncohError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VisitSchedule> for Vec<String> {
    fn from(value: VisitSchedule) -> Self {
        value.visits
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use syncoh_core::{Indication, SyncohError, VisitSchedule};

/// Trial phase; earlier phases enroll healthier, less variable populations.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    I,
    II,
    #[default]
    III,
    IV,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::I => "I",
            Self::II => "II",
            Self::III => "III",
            Self::IV => "IV",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SyncohError> {
        let trimmed = raw.trim();
        let stripped = trimmed
            .strip_prefix("phase")
            .or_else(|| trimmed.strip_prefix("Phase"))
            .unwrap_or(trimmed)
            .trim_start_matches(['_', ' ', '-']);
        match stripped.to_ascii_uppercase().as_str() {
            "I" | "1" => Ok(Self::I),
            "II" | "2" => Ok(Self::II),
            "III" | "3" => Ok(Self::III),
            "IV" | "4" => Ok(Self::IV),
            _ => Err(SyncohError::invalid_config(format!(
                "unknown trial phase '{raw}'; expected I, II, III, or IV"
            ))),
        }
    }

    /// Multiplier applied to range half-widths around the midpoint.
    fn spread(self) -> f64 {
        match self {
            Self::I => 0.6,
            Self::II => 0.85,
            Self::III => 1.0,
            Self::IV => 1.15,
        }
    }
}

/// Inclusive value range for one field.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
}

impl FieldRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    pub fn shifted(&self, delta: f64) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    fn scaled(&self, spread: f64) -> Self {
        let mid = self.midpoint();
        let half = 0.5 * (self.max - self.min) * spread;
        Self {
            min: mid - half,
            max: mid + half,
        }
    }
}

/// Per-field value ranges used by rule-based generation.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
#[derive(Clone, Debug, PartialEq)]
pub struct RangeTable {
    ranges: BTreeMap<String, FieldRange>,
}

const GENERAL_RANGES: [(&str, f64, f64); 7] = [
    ("SystolicBP", 110.0, 140.0),
    ("DiastolicBP", 70.0, 90.0),
    ("HeartRate", 60.0, 90.0),
    ("Temperature", 36.1, 37.5),
    ("RespiratoryRate", 12.0, 20.0),
    ("Weight", 55.0, 100.0),
    ("OxygenSaturation", 95.0, 100.0),
];

impl RangeTable {
    pub fn new(ranges: BTreeMap<String, FieldRange>) -> Result<Self, SyncohError> {
        let table = Self { ranges };
        table.validate()?;
        Ok(table)
    }

    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, SyncohError>
    where
        I: IntoIterator<Item = (S, f64, f64)>,
        S: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(field, min, max)| (field.into(), FieldRange::new(min, max)))
                .collect(),
        )
    }

    /// Built-in vital-sign ranges for an indication, widened or narrowed by phase.
    pub fn builtin(indication: Indication, phase: Phase) -> Self {
        let mut ranges = GENERAL_RANGES
            .iter()
            .map(|&(field, min, max)| (field.to_string(), FieldRange::new(min, max)))
            .collect::<BTreeMap<_, _>>();

        let overrides: &[(&str, f64, f64)] = match indication {
            Indication::Hypertension => &[("SystolicBP", 140.0, 170.0), ("DiastolicBP", 90.0, 105.0)],
            Indication::Diabetes => &[("Weight", 70.0, 120.0), ("SystolicBP", 120.0, 145.0)],
            Indication::Oncology => &[("Weight", 50.0, 85.0), ("HeartRate", 65.0, 100.0)],
            Indication::General => &[],
        };
        for &(field, min, max) in overrides {
            ranges.insert(field.to_string(), FieldRange::new(min, max));
        }

        let spread = phase.spread();
        for range in ranges.values_mut() {
            *range = range.scaled(spread);
        }
        Self { ranges }
    }

    pub fn validate(&self) -> Result<(), SyncohError> {
        if self.ranges.is_empty() {
            return Err(SyncohError::invalid_config(
                "range table must define at least one field",
            ));
        }
        for (field, range) in &self.ranges {
            if field.trim().is_empty() {
                return Err(SyncohError::invalid_config("range table field names must be non-blank"));
            }
            if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
                return Err(SyncohError::invalid_config(format!(
                    "range for '{field}' must be finite with min <= max; got [{}, {}]",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<FieldRange> {
        self.ranges.get(field).copied()
    }

    pub fn fields(&self) -> Vec<String> {
        self.ranges.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldRange)> {
        self.ranges.iter().map(|(field, range)| (field.as_str(), *range))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Range table plus the visit schedule the rule-based generator walks.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RuleConfig {
    pub ranges: RangeTable,
    pub schedule: VisitSchedule,
}

impl RuleConfig {
    pub fn new(ranges: RangeTable, schedule: VisitSchedule) -> Self {
        Self { ranges, schedule }
    }

    pub fn for_indication(indication: Indication, phase: Phase) -> Self {
        Self {
            ranges: RangeTable::builtin(indication, phase),
            schedule: VisitSchedule::for_indication(indication),
        }
    }

    pub fn validate(&self) -> Result<(), SyncohError> {
        self.ranges.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldRange, Phase, RangeTable, RuleConfig};
    use syncoh_core::Indication;

    #[test]
    fn builtin_tables_are_valid_for_every_indication_and_phase() {
        for indication in [
            Indication::Hypertension,
            Indication::Diabetes,
            Indication::Oncology,
            Indication::General,
        ] {
            for phase in [Phase::I, Phase::II, Phase::III, Phase::IV] {
                let config = RuleConfig::for_indication(indication, phase);
                config.validate().expect("built-in table should validate");
                assert_eq!(config.ranges.len(), 7);
            }
        }
    }

    #[test]
    fn phase_scales_around_midpoint() {
        let phase3 = RangeTable::builtin(Indication::Hypertension, Phase::III);
        let phase1 = RangeTable::builtin(Indication::Hypertension, Phase::I);
        let sbp3 = phase3.get("SystolicBP").expect("sbp range");
        let sbp1 = phase1.get("SystolicBP").expect("sbp range");
        assert_eq!(sbp3, FieldRange::new(140.0, 170.0));
        assert!((sbp1.midpoint() - sbp3.midpoint()).abs() < 1e-12);
        assert!(sbp1.max - sbp1.min < sbp3.max - sbp3.min);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let err = RangeTable::from_pairs([("SystolicBP", 150.0, 120.0)])
            .expect_err("inverted range must fail");
        assert_eq!(err.code(), "invalid_configuration");
        let err = RangeTable::from_pairs(Vec::<(String, f64, f64)>::new())
            .expect_err("empty table must fail");
        assert!(err.to_string().contains("at least one field"));
    }

    #[test]
    fn phase_parse_accepts_common_spellings() {
        assert_eq!(Phase::parse("III").expect("phase"), Phase::III);
        assert_eq!(Phase::parse("phase2").expect("phase"), Phase::II);
        assert_eq!(Phase::parse("Phase IV").expect("phase"), Phase::IV);
        assert!(Phase::parse("V").is_err());
    }
}

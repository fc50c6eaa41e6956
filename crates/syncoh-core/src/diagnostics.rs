// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::borrow::Cow;

/// Diagnostics schema version for generation run metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Counters for values clipped to physiological bounds.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipStats {
    pub values_checked: usize,
    pub values_clipped: usize,
}

impl ClipStats {
    pub fn record(&mut self, clipped: bool) {
        self.values_checked += 1;
        if clipped {
            self.values_clipped += 1;
        }
    }

    pub fn rate(&self) -> f64 {
        if self.values_checked == 0 {
            0.0
        } else {
            self.values_clipped as f64 / self.values_checked as f64
        }
    }
}

/// Structured diagnostics captured from a generator execution.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationDiagnostics {
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub method: Cow<'static, str>,
    pub seed: u64,
    pub n_subjects: usize,
    pub n_records: usize,
    pub clip_stats: ClipStats,
    pub clip_rate: f64,
    pub missing_injected: usize,
    pub missing_mechanism: Option<String>,
    pub values_imputed: usize,
    pub estimator: Option<String>,
    pub runtime_ms: Option<u64>,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for GenerationDiagnostics {
    fn default() -> Self {
        Self {
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            method: Cow::Borrowed(""),
            seed: 0,
            n_subjects: 0,
            n_records: 0,
            clip_stats: ClipStats::default(),
            clip_rate: 0.0,
            missing_injected: 0,
            missing_mechanism: None,
            values_imputed: 0,
            estimator: None,
            runtime_ms: None,
            notes: vec![],
            warnings: vec![],
        }
    }
}

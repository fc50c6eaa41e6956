// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Core record model and shared contracts for synthetic cohort generation and scoring.

pub mod cohort;
pub mod diagnostics;
pub mod error;
pub mod record;
pub mod repro;
pub mod request;
pub mod schedule;

pub use cohort::{ArmCounts, Cohort, Subject};
pub use diagnostics::{ClipStats, DIAGNOSTICS_SCHEMA_VERSION, GenerationDiagnostics};
pub use error::SyncohError;
pub use record::{Arm, Record};
pub use repro::{RngStream, seeded_rng};
pub use request::{Estimator, GenerationRequest, MissingMechanism};
pub use schedule::{Indication, VisitSchedule};

/// Synthetic cohort generated by one strategy, with its run diagnostics.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedCohort {
    pub cohort: Cohort,
    pub diagnostics: GenerationDiagnostics,
}

/// Core shared types and traits for syncoh.
pub fn crate_name() -> &'static str {
    "syncoh-core"
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Reference fitting and synthetic cohort generation.

mod assemble;
pub mod bootstrap;
pub mod bounds;
pub mod fit;
pub mod generator;
pub mod impute;
pub mod missing;
pub mod mvn;
pub mod ranges;
pub mod rule;

pub use bootstrap::BootstrapGenerator;
pub use bounds::{finalize_value, physiological_bounds};
pub use fit::{DistributionModel, GroupModel, fit};
pub use generator::{CohortGenerator, GenerationContext, GeneratorMethod, generate_with};
pub use impute::impute;
pub use missing::inject_missing;
pub use mvn::{MvnConfig, MvnGenerator};
pub use ranges::{FieldRange, Phase, RangeTable, RuleConfig};
pub use rule::RuleBasedGenerator;

pub fn crate_name() -> &'static str {
    let _ = (syncoh_core::crate_name(), syncoh_stats::crate_name());
    "syncoh-gen"
}

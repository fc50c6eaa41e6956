// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Ranks generation methods on fidelity, throughput, and external similarity.

pub mod ranking;

pub use ranking::{
    CompareConfig, MethodMeasurement, MethodRun, RankedMethod, RankingReport, RankingWeights,
    Tradeoff, compare, rank, records_per_second,
};

pub fn crate_name() -> &'static str {
    let _ = (syncoh_core::crate_name(), syncoh_eval::crate_name());
    "syncoh-doctor"
}

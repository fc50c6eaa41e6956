// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use syncoh_core::ClipStats;

/// Absolute physiological limits for known vital-sign fields.
const PHYSIOLOGICAL_BOUNDS: [(&str, f64, f64); 7] = [
    ("SystolicBP", 60.0, 260.0),
    ("DiastolicBP", 30.0, 160.0),
    ("HeartRate", 30.0, 220.0),
    ("Temperature", 33.0, 43.0),
    ("RespiratoryRate", 4.0, 60.0),
    ("Weight", 20.0, 300.0),
    ("OxygenSaturation", 50.0, 100.0),
];

pub fn physiological_bounds(field: &str) -> Option<(f64, f64)> {
    PHYSIOLOGICAL_BOUNDS
        .iter()
        .find(|(name, _, _)| *name == field)
        .map(|&(_, lo, hi)| (lo, hi))
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Clips to the field's physiological range (when known) and rounds to one decimal.
pub fn finalize_value(field: &str, raw: f64, clip: &mut ClipStats) -> f64 {
    let (value, clipped) = match physiological_bounds(field) {
        Some((lo, _)) if raw < lo => (lo, true),
        Some((_, hi)) if raw > hi => (hi, true),
        _ => (raw, false),
    };
    clip.record(clipped);
    round_one_decimal(value)
}

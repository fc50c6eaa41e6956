// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use syncoh_core::{Arm, Cohort, Record, VisitSchedule};

pub const FIELD_NAMES: [&str; 4] = ["SystolicBP", "DiastolicBP", "HeartRate", "Weight"];

/// Reads fuzzer bytes front to back, yielding zeros once exhausted.
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn next_u8(&mut self) -> u8 {
        let value = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos = self.pos.saturating_add(1);
        value
    }

    pub fn next_i16(&mut self) -> i16 {
        i16::from_le_bytes([self.next_u8(), self.next_u8()])
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        for byte in &mut bytes {
            *byte = self.next_u8();
        }
        u64::from_le_bytes(bytes)
    }
}

/// Maps `seed` into `lo..=hi`.
pub fn bounded(seed: u8, lo: usize, hi: usize) -> usize {
    lo + usize::from(seed) % (hi - lo + 1)
}

/// A value around a vital-sign baseline, occasionally missing or non-finite.
pub fn vital_value(cursor: &mut ByteCursor<'_>, field_idx: usize) -> Option<f64> {
    let base = [125.0, 80.0, 72.0, 78.0][field_idx % 4];
    match cursor.next_u8() % 16 {
        0 => None,
        1 => Some(f64::NAN),
        2 => Some(base),
        _ => Some(base + f64::from(cursor.next_i16()) / 64.0),
    }
}

/// Builds a cohort from fuzzer bytes; `None` when validation rejects it.
pub fn cohort(cursor: &mut ByteCursor<'_>, d: usize, n_subjects: usize) -> Option<Cohort> {
    let schedule = VisitSchedule::new(["Baseline", "Week 8"]).ok()?;
    let fields = FIELD_NAMES[..d]
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>();
    let mut records = Vec::new();
    for i in 0..n_subjects {
        let arm = if i % 2 == 0 { Arm::Active } else { Arm::Placebo };
        let visits: &[&str] = match cursor.next_u8() % 3 {
            0 => &["Baseline"],
            1 => &["Week 8"],
            _ => &["Baseline", "Week 8"],
        };
        for visit in visits {
            let mut record = Record::new(format!("F{i:03}"), *visit, arm);
            for (j, field) in fields.iter().enumerate() {
                record.values.insert(field.clone(), vital_value(cursor, j));
            }
            records.push(record);
        }
    }
    Cohort::new(schedule, fields, records).ok()
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::record::{Arm, Record};
use crate::schedule::VisitSchedule;
use crate::SyncohError;
use std::collections::{BTreeMap, BTreeSet};

const RESERVED_FIELDS: [&str; 3] = ["subject_id", "visit_name", "treatment_arm"];

/// Unique-subject counts per arm.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArmCounts {
    pub active: usize,
    pub placebo: usize,
}

impl ArmCounts {
    pub fn get(&self, arm: Arm) -> usize {
        match arm {
            Arm::Active => self.active,
            Arm::Placebo => self.placebo,
        }
    }

    pub fn imbalance(&self) -> usize {
        self.active.abs_diff(self.placebo)
    }

    pub fn total(&self) -> usize {
        self.active + self.placebo
    }
}

/// All records of one subject, in cohort order.
#[derive(Clone, Debug)]
pub struct Subject<'a> {
    pub id: &'a str,
    pub arm: Arm,
    pub records: Vec<&'a Record>,
}

/// Validated, ordered sequence of subject-visit records sharing one field set.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "CohortWire", into = "CohortWire")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct Cohort {
    schedule: VisitSchedule,
    fields: Vec<String>,
    records: Vec<Record>,
}

impl Cohort {
    /// Builds a cohort and validates record, subject, and visit-order invariants.
    pub fn new(
        schedule: VisitSchedule,
        fields: Vec<String>,
        records: Vec<Record>,
    ) -> Result<Self, SyncohError> {
        validate_fields(&fields)?;
        validate_records(&schedule, &fields, &records)?;
        Ok(Self {
            schedule,
            fields,
            records,
        })
    }

    /// Builds a cohort whose field list is taken from the first record (sorted by name).
    pub fn from_records(
        schedule: VisitSchedule,
        records: Vec<Record>,
    ) -> Result<Self, SyncohError> {
        let fields = records
            .first()
            .map(|record| record.values.keys().cloned().collect::<Vec<_>>())
            .ok_or_else(|| {
                SyncohError::insufficient_data("cannot infer fields from an empty record list")
            })?;
        Self::new(schedule, fields, records)
    }

    pub fn schedule(&self) -> &VisitSchedule {
        &self.schedule
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_parts(self) -> (VisitSchedule, Vec<String>, Vec<Record>) {
        (self.schedule, self.fields, self.records)
    }

    /// Groups records by subject in order of first appearance.
    pub fn subjects(&self) -> Vec<Subject<'_>> {
        let mut order: Vec<Subject<'_>> = Vec::new();
        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &self.records {
            match index.get(record.subject_id.as_str()) {
                Some(&slot) => order[slot].records.push(record),
                None => {
                    index.insert(record.subject_id.as_str(), order.len());
                    order.push(Subject {
                        id: record.subject_id.as_str(),
                        arm: record.arm,
                        records: vec![record],
                    });
                }
            }
        }
        order
    }

    pub fn arm_counts(&self) -> ArmCounts {
        let mut seen = BTreeSet::new();
        let mut counts = ArmCounts::default();
        for record in &self.records {
            if seen.insert(record.subject_id.as_str()) {
                match record.arm {
                    Arm::Active => counts.active += 1,
                    Arm::Placebo => counts.placebo += 1,
                }
            }
        }
        counts
    }

    /// True when unique-subject counts per arm differ by at most one.
    pub fn is_arm_balanced(&self) -> bool {
        self.arm_counts().imbalance() <= 1
    }

    /// Checks arm balance against an explicit tolerance.
    pub fn check_arm_balance(&self, tolerance: usize) -> Result<ArmCounts, SyncohError> {
        let counts = self.arm_counts();
        if counts.imbalance() > tolerance {
            return Err(SyncohError::invalid_config(format!(
                "arm balance violated: active={}, placebo={}, tolerance={tolerance}",
                counts.active, counts.placebo
            )));
        }
        Ok(counts)
    }

    /// Non-missing values of one field, in record order.
    pub fn column(&self, field: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|record| record.value(field))
            .collect()
    }

    /// Rows with every listed field present, values ordered as `fields`.
    pub fn complete_rows(&self, fields: &[String]) -> Vec<Vec<f64>> {
        self.records
            .iter()
            .filter_map(|record| {
                fields
                    .iter()
                    .map(|field| record.value(field))
                    .collect::<Option<Vec<f64>>>()
            })
            .collect()
    }

    pub fn missing_count(&self) -> usize {
        self.records
            .iter()
            .map(|record| record.values.values().filter(|v| v.is_none()).count())
            .sum()
    }

    /// Fails with `SchemaMismatch` unless both cohorts carry the same field set.
    pub fn ensure_same_fields(&self, other: &Cohort) -> Result<(), SyncohError> {
        let ours = self.fields.iter().map(String::as_str).collect::<BTreeSet<_>>();
        let theirs = other.fields.iter().map(String::as_str).collect::<BTreeSet<_>>();
        if ours == theirs {
            return Ok(());
        }
        let missing = ours.difference(&theirs).copied().collect::<Vec<_>>();
        let extra = theirs.difference(&ours).copied().collect::<Vec<_>>();
        Err(SyncohError::schema_mismatch(format!(
            "field sets differ; missing from other: [{}], extra in other: [{}]",
            missing.join(", "),
            extra.join(", ")
        )))
    }
}

fn validate_fields(fields: &[String]) -> Result<(), SyncohError> {
    if fields.is_empty() {
        return Err(SyncohError::invalid_config(
            "cohort must declare at least one numeric field",
        ));
    }
    let mut seen = BTreeSet::new();
    for field in fields {
        if RESERVED_FIELDS.contains(&field.as_str()) {
            return Err(SyncohError::invalid_config(format!(
                "numeric field name '{field}' collides with a reserved column"
            )));
        }
        if !seen.insert(field.as_str()) {
            return Err(SyncohError::invalid_config(format!(
                "numeric field '{field}' is declared twice"
            )));
        }
    }
    Ok(())
}

fn validate_records(
    schedule: &VisitSchedule,
    fields: &[String],
    records: &[Record],
) -> Result<(), SyncohError> {
    let expected = fields.iter().map(String::as_str).collect::<BTreeSet<_>>();
    let mut last_visit: BTreeMap<&str, (Arm, usize)> = BTreeMap::new();

    for (idx, record) in records.iter().enumerate() {
        if record.subject_id.trim().is_empty() {
            return Err(SyncohError::invalid_config(format!(
                "records[{idx}] has a blank subject_id"
            )));
        }

        let keys = record.values.keys().map(String::as_str).collect::<BTreeSet<_>>();
        if keys != expected {
            return Err(SyncohError::schema_mismatch(format!(
                "records[{idx}] (subject '{}') fields [{}] do not match cohort fields [{}]",
                record.subject_id,
                keys.into_iter().collect::<Vec<_>>().join(", "),
                fields.join(", ")
            )));
        }
        if let Some((field, value)) = record
            .values
            .iter()
            .find_map(|(field, value)| value.filter(|v| !v.is_finite()).map(|v| (field, v)))
        {
            return Err(SyncohError::invalid_config(format!(
                "records[{idx}].{field} must be finite, got {value}"
            )));
        }

        let position = schedule.position(&record.visit).ok_or_else(|| {
            SyncohError::invalid_config(format!(
                "records[{idx}] visit '{}' is not in the visit schedule",
                record.visit
            ))
        })?;

        match last_visit.get_mut(record.subject_id.as_str()) {
            Some((arm, previous)) => {
                if *arm != record.arm {
                    return Err(SyncohError::invalid_config(format!(
                        "subject '{}' appears in both {} and {} arms",
                        record.subject_id,
                        arm.as_str(),
                        record.arm.as_str()
                    )));
                }
                if position <= *previous {
                    return Err(SyncohError::invalid_config(format!(
                        "subject '{}' visit '{}' is duplicated or out of schedule order",
                        record.subject_id, record.visit
                    )));
                }
                *previous = position;
            }
            None => {
                last_visit.insert(record.subject_id.as_str(), (record.arm, position));
            }
        }
    }
    Ok(())
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct CohortWire {
    schedule: VisitSchedule,
    #[serde(default)]
    fields: Option<Vec<String>>,
    records: Vec<Record>,
}

#[cfg(feature = "serde")]
impl TryFrom<CohortWire> for Cohort {
    type Error = SyncohError;

    fn try_from(value: CohortWire) -> Result<Self, Self::Error> {
        match value.fields {
            Some(fields) => Cohort::new(value.schedule, fields, value.records),
            None => Cohort::from_records(value.schedule, value.records),
        }
    }
}

#[cfg(feature = "serde")]
impl From<Cohort> for CohortWire {
    fn from(value: Cohort) -> Self {
        Self {
            schedule: value.schedule,
            fields: Some(value.fields),
            records: value.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cohort;
    use crate::{Arm, Record, VisitSchedule};

    fn schedule() -> VisitSchedule {
        VisitSchedule::new(["Baseline", "Week 4", "Week 8"]).expect("schedule should be valid")
    }

    fn row(subject: &str, visit: &str, arm: Arm, sbp: f64) -> Record {
        Record::new(subject, visit, arm)
            .with_value("SystolicBP", sbp)
            .with_value("HeartRate", 70.0)
    }

    fn fields() -> Vec<String> {
        vec!["SystolicBP".to_string(), "HeartRate".to_string()]
    }

    #[test]
    fn cohort_accepts_visit_subsequences() {
        let cohort = Cohort::new(
            schedule(),
            fields(),
            vec![
                row("S1", "Baseline", Arm::Active, 120.0),
                row("S2", "Week 4", Arm::Placebo, 125.0),
                row("S1", "Week 8", Arm::Active, 118.0),
            ],
        )
        .expect("cohort should validate");

        let subjects = cohort.subjects();
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].id, "S1");
        assert_eq!(subjects[0].records.len(), 2);
        assert!(cohort.is_arm_balanced());
        assert_eq!(cohort.column("SystolicBP"), vec![120.0, 125.0, 118.0]);
    }

    #[test]
    fn cohort_rejects_visit_inversion_and_duplicates() {
        let err = Cohort::new(
            schedule(),
            fields(),
            vec![
                row("S1", "Week 4", Arm::Active, 120.0),
                row("S1", "Baseline", Arm::Active, 121.0),
            ],
        )
        .expect_err("inverted visits should fail");
        assert!(err.to_string().contains("out of schedule order"));

        let err = Cohort::new(
            schedule(),
            fields(),
            vec![
                row("S1", "Week 4", Arm::Active, 120.0),
                row("S1", "Week 4", Arm::Active, 121.0),
            ],
        )
        .expect_err("duplicate visit should fail");
        assert!(err.to_string().contains("duplicated"));
    }

    #[test]
    fn cohort_rejects_arm_switch_and_unknown_visit() {
        let err = Cohort::new(
            schedule(),
            fields(),
            vec![
                row("S1", "Baseline", Arm::Active, 120.0),
                row("S1", "Week 4", Arm::Placebo, 121.0),
            ],
        )
        .expect_err("arm switch should fail");
        assert!(err.to_string().contains("both Active and Placebo"));

        let err = Cohort::new(
            schedule(),
            fields(),
            vec![row("S1", "Week 52", Arm::Active, 120.0)],
        )
        .expect_err("unknown visit should fail");
        assert!(err.to_string().contains("not in the visit schedule"));
    }

    #[test]
    fn cohort_rejects_field_set_drift() {
        let err = Cohort::new(
            schedule(),
            fields(),
            vec![Record::new("S1", "Baseline", Arm::Active).with_value("SystolicBP", 120.0)],
        )
        .expect_err("missing field should fail");
        assert_eq!(err.code(), "schema_mismatch");
    }

    #[test]
    fn arm_balance_check_reports_counts() {
        let cohort = Cohort::new(
            schedule(),
            fields(),
            vec![
                row("S1", "Baseline", Arm::Active, 120.0),
                row("S2", "Baseline", Arm::Active, 121.0),
                row("S3", "Baseline", Arm::Active, 122.0),
                row("S4", "Baseline", Arm::Placebo, 123.0),
            ],
        )
        .expect("cohort should validate");
        assert!(!cohort.is_arm_balanced());
        assert!(cohort.check_arm_balance(2).is_ok());
        let err = cohort
            .check_arm_balance(1)
            .expect_err("imbalance of 2 should exceed tolerance 1");
        assert!(err.to_string().contains("active=3, placebo=1"));
    }

    #[test]
    fn complete_rows_skip_missing_values() {
        let cohort = Cohort::new(
            schedule(),
            fields(),
            vec![
                row("S1", "Baseline", Arm::Active, 120.0),
                Record::new("S2", "Baseline", Arm::Placebo)
                    .with_value("SystolicBP", 130.0)
                    .with_missing("HeartRate"),
            ],
        )
        .expect("cohort should validate");
        let rows = cohort.complete_rows(&["HeartRate".to_string(), "SystolicBP".to_string()]);
        assert_eq!(rows, vec![vec![70.0, 120.0]]);
        assert_eq!(cohort.missing_count(), 1);
    }

    #[test]
    fn ensure_same_fields_names_the_difference() {
        let a = Cohort::new(
            schedule(),
            fields(),
            vec![row("S1", "Baseline", Arm::Active, 120.0)],
        )
        .expect("cohort should validate");
        let b = Cohort::new(
            schedule(),
            vec!["SystolicBP".to_string()],
            vec![Record::new("S1", "Baseline", Arm::Active).with_value("SystolicBP", 120.0)],
        )
        .expect("cohort should validate");
        let err = a.ensure_same_fields(&b).expect_err("field sets differ");
        assert!(err.to_string().contains("missing from other: [HeartRate]"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn cohort_json_roundtrip_infers_fields() {
        let raw = r#"{
            "schedule": ["Baseline", "Week 4"],
            "records": [
                {"subject_id": "S1", "visit_name": "Baseline", "treatment_arm": "Active", "HeartRate": 72.0},
                {"subject_id": "S1", "visit_name": "Week 4", "treatment_arm": "Active", "HeartRate": null}
            ]
        }"#;
        let cohort: Cohort = serde_json::from_str(raw).expect("cohort should deserialize");
        assert_eq!(cohort.fields(), ["HeartRate".to_string()]);
        assert_eq!(cohort.missing_count(), 1);

        let encoded = serde_json::to_string(&cohort).expect("cohort should serialize");
        let decoded: Cohort = serde_json::from_str(&encoded).expect("cohort should roundtrip");
        assert_eq!(decoded, cohort);
    }
}

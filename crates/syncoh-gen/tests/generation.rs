// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use syncoh_core::{
    Arm, Cohort, Estimator, GenerationRequest, MissingMechanism, Record, VisitSchedule,
};
use syncoh_gen::{
    GenerationContext, GeneratorMethod, Phase, RuleConfig, fit, generate_with,
};

fn reference_cohort() -> Cohort {
    let schedule = VisitSchedule::new(["Screening", "Baseline", "Week 4", "Week 12"])
        .expect("valid schedule");
    let mut records = Vec::new();
    for arm in Arm::ALL {
        for i in 0..16 {
            let id = format!("REF-{}-{i:02}", arm.code());
            let sbp = 138.0 + (i % 5) as f64 * 0.6;
            let dbp = 86.0 + (i % 3) as f64 * 0.7;
            let hr = 68.0 + (i % 7) as f64;
            for (v, visit) in ["Screening", "Baseline", "Week 4", "Week 12"].iter().enumerate() {
                let drift = v as f64 * -1.0;
                records.push(
                    Record::new(&id, *visit, arm)
                        .with_value("SystolicBP", sbp + drift)
                        .with_value("DiastolicBP", dbp + 0.5 * drift)
                        .with_value("HeartRate", hr),
                );
            }
        }
    }
    Cohort::new(
        schedule,
        vec![
            "SystolicBP".to_string(),
            "DiastolicBP".to_string(),
            "HeartRate".to_string(),
        ],
        records,
    )
    .expect("valid reference cohort")
}

fn terminal_effect(cohort: &Cohort, field: &str) -> f64 {
    let terminal = cohort.schedule().terminal();
    let mean = |arm: Arm| {
        let values = cohort
            .records()
            .iter()
            .filter(|r| r.arm == arm && r.visit == terminal)
            .filter_map(|r| r.value(field))
            .collect::<Vec<_>>();
        values.iter().sum::<f64>() / values.len() as f64
    };
    mean(Arm::Active) - mean(Arm::Placebo)
}

#[test]
fn every_method_is_deterministic_and_balanced() {
    let reference = reference_cohort();
    let model = fit(&reference).expect("model should fit");
    let rules = RuleConfig::for_indication(syncoh_core::Indication::Hypertension, Phase::III);
    let context = GenerationContext::new()
        .with_reference(&reference)
        .with_model(&model)
        .with_rules(&rules);
    let request = GenerationRequest::new(25, 2024);

    for method in GeneratorMethod::ALL {
        let first = generate_with(method, &request, &context).expect("generation should succeed");
        let second = generate_with(method, &request, &context).expect("generation should succeed");
        assert_eq!(first.cohort, second.cohort, "{} must be deterministic", method.as_str());
        assert!(first.cohort.is_arm_balanced());
        let counts = first.cohort.arm_counts();
        assert_eq!(counts.active, 25);
        assert_eq!(counts.placebo, 25);
        assert_eq!(first.diagnostics.method, method.as_str());
        assert_eq!(first.diagnostics.n_subjects, 50);

        let other_seed = generate_with(method, &GenerationRequest::new(25, 2025), &context)
            .expect("generation should succeed");
        assert_ne!(first.cohort, other_seed.cohort);
    }
}

#[test]
fn every_method_realizes_the_target_effect() {
    let reference = reference_cohort();
    let model = fit(&reference).expect("model should fit");
    let rules = RuleConfig::new(
        syncoh_gen::RangeTable::from_pairs([
            ("SystolicBP", 118.0, 122.0),
            ("DiastolicBP", 78.0, 82.0),
            ("HeartRate", 66.0, 74.0),
        ])
        .expect("valid table"),
        reference.schedule().clone(),
    );
    let context = GenerationContext::new()
        .with_reference(&reference)
        .with_model(&model)
        .with_rules(&rules);
    let request = GenerationRequest::new(50, 99).with_target_effect("SystolicBP", -5.0);

    for method in GeneratorMethod::ALL {
        let generated = generate_with(method, &request, &context).expect("generation should succeed");
        let effect = terminal_effect(&generated.cohort, "SystolicBP");
        assert!(
            (effect + 5.0).abs() <= 1.0,
            "{} realized effect {effect}",
            method.as_str()
        );
    }
}

#[test]
fn missingness_then_imputation_leaves_complete_cohort() {
    let reference = reference_cohort();
    let model = fit(&reference).expect("model should fit");
    let context = GenerationContext::new().with_model(&model);

    let request = GenerationRequest::new(20, 5).with_missingness(
        0.15,
        MissingMechanism::Mar {
            driver: "HeartRate".to_string(),
        },
    );
    let with_gaps = generate_with(GeneratorMethod::Mvn, &request, &context)
        .expect("generation should succeed");
    assert!(with_gaps.diagnostics.missing_injected > 0);
    assert_eq!(
        with_gaps.cohort.missing_count(),
        with_gaps.diagnostics.missing_injected
    );

    for estimator in [
        Estimator::Mean,
        Estimator::Knn { k: 5 },
        Estimator::ChainedLinear { max_iter: 10 },
    ] {
        let completed = generate_with(
            GeneratorMethod::Mvn,
            &request.clone().with_estimator(estimator),
            &context,
        )
        .expect("generation should succeed");
        assert_eq!(completed.cohort.missing_count(), 0);
        assert_eq!(
            completed.diagnostics.values_imputed,
            completed.diagnostics.missing_injected
        );
        assert_eq!(completed.diagnostics.estimator.as_deref(), Some(estimator.label()));
    }
}

#[test]
fn model_not_fitted_and_empty_reference_are_distinct() {
    let request = GenerationRequest::new(3, 1);
    let context = GenerationContext::new();
    let mvn = generate_with(GeneratorMethod::Mvn, &request, &context).expect_err("no model");
    assert_eq!(mvn.code(), "model_not_fitted");
    let bootstrap =
        generate_with(GeneratorMethod::Bootstrap, &request, &context).expect_err("no reference");
    assert_eq!(bootstrap.code(), "empty_reference");
}

#[test]
fn invalid_requests_fail_before_sampling() {
    let reference = reference_cohort();
    let context = GenerationContext::new().with_reference(&reference);
    let err = generate_with(GeneratorMethod::Bootstrap, &GenerationRequest::new(0, 1), &context)
        .expect_err("n_per_arm=0 must fail");
    assert_eq!(err.code(), "invalid_configuration");

    let request = GenerationRequest::new(4, 1).with_target_effect("Glucose", 1.0);
    let err = generate_with(GeneratorMethod::Bootstrap, &request, &context)
        .expect_err("unknown effect field must fail");
    assert!(err.to_string().contains("Glucose"));
}

#[test]
fn clipping_is_counted_not_fatal() {
    let rules = RuleConfig::new(
        syncoh_gen::RangeTable::from_pairs([("SystolicBP", 250.0, 290.0)]).expect("valid table"),
        VisitSchedule::new(["Baseline"]).expect("valid schedule"),
    );
    let context = GenerationContext::new().with_rules(&rules);
    let generated = generate_with(GeneratorMethod::RuleBased, &GenerationRequest::new(40, 3), &context)
        .expect("generation should succeed");
    let clip = &generated.diagnostics.clip_stats;
    assert_eq!(clip.values_checked, 80);
    assert!(clip.values_clipped > 0);
    assert!(generated.diagnostics.clip_rate > 0.0);
    assert!(!generated.diagnostics.warnings.is_empty());
    assert!(
        generated
            .cohort
            .column("SystolicBP")
            .iter()
            .all(|v| *v <= 260.0)
    );
}

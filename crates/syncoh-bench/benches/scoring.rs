// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::collections::BTreeMap;
use syncoh_bench::reference_cohort;
use syncoh_core::GenerationRequest;
use syncoh_doctor::{CompareConfig, MethodRun, compare};
use syncoh_eval::{ScoreConfig, score};
use syncoh_gen::{GenerationContext, GeneratorMethod, fit, generate_with};

fn benchmark_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");
    group.sample_size(20);
    for n_per_arm in [50usize, 250] {
        let real = reference_cohort(n_per_arm, 1).expect("benchmark cohort should build");
        let synthetic = reference_cohort(n_per_arm, 2).expect("benchmark cohort should build");
        let config = ScoreConfig::default();
        group.bench_with_input(
            BenchmarkId::from_parameter(n_per_arm),
            &(real, synthetic),
            |b, (real, synthetic)| {
                b.iter(|| {
                    score(black_box(real), black_box(synthetic), &config)
                        .expect("scoring should succeed")
                });
            },
        );
    }
    group.finish();
}

fn benchmark_compare(c: &mut Criterion) {
    let real = reference_cohort(100, 3).expect("benchmark cohort should build");
    let model = fit(&real).expect("fit should succeed");
    let context = GenerationContext::new()
        .with_reference(&real)
        .with_model(&model);
    let request = GenerationRequest::new(100, 9);
    let runs = [GeneratorMethod::Mvn, GeneratorMethod::Bootstrap]
        .into_iter()
        .map(|method| {
            let generated =
                generate_with(method, &request, &context).expect("generation should succeed");
            (
                method.as_str().to_string(),
                MethodRun::new(generated.cohort, 5.0, 0.5),
            )
        })
        .collect::<BTreeMap<_, _>>();
    let config = CompareConfig::default();

    let mut group = c.benchmark_group("compare");
    group.sample_size(10);
    group.bench_function("mvn_vs_bootstrap_n100", |b| {
        b.iter(|| compare(black_box(&runs), black_box(&real), &config).expect("compare"));
    });
    group.finish();
}

criterion_group!(benches, benchmark_score, benchmark_compare);
criterion_main!(benches);

// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use libfuzzer_sys::fuzz_target;
use syncoh_core::{Estimator, GenerationRequest, MissingMechanism};
use syncoh_gen::{GenerationContext, GeneratorMethod, fit, generate_with};

fn estimator(seed: u8) -> Option<Estimator> {
    match seed % 4 {
        0 => None,
        1 => Some(Estimator::Mean),
        2 => Some(Estimator::Knn {
            k: usize::from(seed % 7) + 1,
        }),
        _ => Some(Estimator::ChainedLinear {
            max_iter: usize::from(seed % 5) + 1,
        }),
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let d = common::bounded(cursor.next_u8(), 1, 4);
    let n_subjects = common::bounded(cursor.next_u8(), 0, 30);
    let Some(reference) = common::cohort(&mut cursor, d, n_subjects) else {
        return;
    };

    let mut request = GenerationRequest::new(common::bounded(cursor.next_u8(), 1, 12), cursor.next_u64());
    if cursor.next_u8() & 1 == 1 {
        request.target_effect = Some(f64::from(cursor.next_i16()) / 256.0);
    }
    request.missing_rate = f64::from(cursor.next_u8() % 50) / 100.0;
    if cursor.next_u8() & 1 == 1 {
        request.missing_mechanism = MissingMechanism::Mar {
            driver: common::FIELD_NAMES[0].to_string(),
        };
    }
    request.estimator = estimator(cursor.next_u8());

    let model = fit(&reference).ok();
    let mut context = GenerationContext::new().with_reference(&reference);
    if let Some(model) = model.as_ref() {
        context = context.with_model(model);
    }

    for method in [GeneratorMethod::Mvn, GeneratorMethod::Bootstrap] {
        if let Ok(generated) = generate_with(method, &request, &context) {
            assert!(generated.cohort.is_arm_balanced());
            assert_eq!(generated.diagnostics.n_records, generated.cohort.len());
        }
    }
});

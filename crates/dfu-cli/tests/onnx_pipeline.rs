//! Library-level pipeline tests against a real ONNX Runtime session.

mod support;

use std::sync::Arc;

use dfu_core::features::FEATURE_LEN;
use dfu_core::{Classifier, DfuModel, InferenceContext, PipelineConfig, PipelineError};
use support::Fixture;

fn load(fx: &Fixture) -> InferenceContext {
    InferenceContext::load(&PipelineConfig {
        model_path: fx.model.clone(),
        bundle_path: fx.bundle.clone(),
    })
    .unwrap_or_else(|e| panic!("fixture failed to load: {e}"))
}

#[test]
fn model_declares_feature_length() {
    let fx = Fixture::new();
    let model = DfuModel::load(&fx.model).unwrap();
    assert_eq!(model.input_len(), Some(FEATURE_LEN));
}

#[test]
fn garbage_model_file_is_a_load_error() {
    let fx = Fixture::new();
    std::fs::write(&fx.model, b"not a model").unwrap();
    let err = DfuModel::load(&fx.model).err().unwrap();
    assert!(matches!(err, PipelineError::ModelLoad { .. }));
}

#[test]
fn auxiliary_vector_is_fixed_for_the_context() {
    let fx = Fixture::new();
    let context = load(&fx);
    let aux = context.auxiliary_features().to_vec();
    assert_eq!(aux.len(), FEATURE_LEN);
    assert!(aux.iter().all(|&v| v == 0.0));

    let image = fx.gray_image("foot.png", 64, 64, 128);
    context.predict_path(&image).unwrap();
    assert_eq!(context.auxiliary_features(), &aux[..]);
}

#[test]
fn path_and_bytes_agree() {
    let fx = Fixture::new();
    let context = load(&fx);
    let image = fx.gray_image("foot.png", 97, 131, 77);

    let from_path = context.predict_path(&image).unwrap();
    let from_bytes = context.predict_bytes(&std::fs::read(&image).unwrap()).unwrap();
    assert_eq!(from_path, from_bytes);
    assert!((from_path.probability - 77.0 / 255.0 * 100.0).abs() < 1e-3);
}

#[test]
fn shared_context_is_deterministic_across_threads() {
    let fx = Fixture::new();
    let context = Arc::new(load(&fx));
    let image = fx.gray_image("foot.png", 128, 128, 200);
    let expected = context.predict_path(&image).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let context = Arc::clone(&context);
            let image = image.clone();
            std::thread::spawn(move || context.predict_path(&image).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

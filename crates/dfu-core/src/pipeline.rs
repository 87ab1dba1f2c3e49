//! Per-request inference: decode → features → model → probability.
//!
//! [`InferenceContext`] owns the loaded model and bundle. Build it once and
//! pass it to every request; it is `Sync` and can be shared across threads.

use std::path::{Path, PathBuf};

use image::GrayImage;
use serde::Serialize;

use crate::bundle::PreprocessingBundle;
use crate::error::{PipelineError, Resource};
use crate::features::{self, FEATURE_LEN};
use crate::inference::{Classifier, DfuModel};

pub const DEFAULT_MODEL_PATH: &str = "models/dfu_model.onnx";
pub const DEFAULT_BUNDLE_PATH: &str = "models/preprocessing.json";

/// Probabilities strictly above this are reported as high risk.
pub const DEFAULT_RISK_THRESHOLD: f64 = 50.0;

/// Artifact locations for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model_path: PathBuf,
    pub bundle_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            bundle_path: PathBuf::from(DEFAULT_BUNDLE_PATH),
        }
    }
}

/// Model output scaled to a percentage. Not clamped: a model emitting
/// values outside [0, 1] yields a probability outside [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub probability: f64,
}

impl Prediction {
    pub fn from_model_output(output: f32) -> Self {
        Self {
            probability: f64::from(output) * 100.0,
        }
    }

    pub fn risk(&self, threshold: f64) -> RiskLevel {
        RiskLevel::classify(self.probability, threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Low,
}

impl RiskLevel {
    pub fn classify(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            RiskLevel::High => "High risk detected! Consult a medical professional.",
            RiskLevel::Low => "Low risk detected. Maintain good foot care.",
        }
    }
}

pub struct InferenceContext<M = DfuModel> {
    model: M,
    bundle: PreprocessingBundle,
    auxiliary: Vec<f32>,
}

impl InferenceContext<DfuModel> {
    /// Load model and bundle. Existence of both is checked, model first,
    /// before either is parsed.
    pub fn load(config: &PipelineConfig) -> Result<Self, PipelineError> {
        require(&config.model_path, Resource::Model)?;
        require(&config.bundle_path, Resource::Preprocessing)?;

        let model = DfuModel::load(&config.model_path)?;
        let bundle = PreprocessingBundle::load(&config.bundle_path)?;
        tracing::info!(
            model = %config.model_path.display(),
            bundle = %config.bundle_path.display(),
            mean = bundle.mean,
            "pipeline ready"
        );
        Ok(Self::new(model, bundle))
    }
}

fn require(path: &Path, resource: Resource) -> Result<(), PipelineError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::ResourceNotFound {
            resource,
            path: path.to_path_buf(),
        })
    }
}

impl<M: Classifier> InferenceContext<M> {
    pub fn new(model: M, bundle: PreprocessingBundle) -> Self {
        let auxiliary = features::auxiliary_features(&bundle);
        Self {
            model,
            bundle,
            auxiliary,
        }
    }

    pub fn bundle(&self) -> &PreprocessingBundle {
        &self.bundle
    }

    /// The auxiliary vector fed with every request; fixed for the context's
    /// lifetime.
    pub fn auxiliary_features(&self) -> &[f32] {
        &self.auxiliary
    }

    pub fn predict_path(&self, path: &Path) -> Result<Prediction, PipelineError> {
        let gray = features::open_grayscale(path)?;
        self.predict_image(&gray)
    }

    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction, PipelineError> {
        let gray = features::decode_grayscale(bytes)?;
        self.predict_image(&gray)
    }

    pub fn predict_image(&self, gray: &GrayImage) -> Result<Prediction, PipelineError> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(PipelineError::InvalidImage);
        }
        let image = features::image_features(gray);
        self.predict_features(&image)
    }

    /// Run the model on a prepared image vector with the cached auxiliary
    /// vector.
    pub fn predict_features(&self, image: &[f32]) -> Result<Prediction, PipelineError> {
        let expected = self.model.input_len().unwrap_or(FEATURE_LEN);
        check_len("image", expected, image.len())?;
        check_len("auxiliary", expected, self.auxiliary.len())?;

        let output = self.model.classify(image, &self.auxiliary)?;
        if !output.is_finite() {
            return Err(PipelineError::Inference(format!(
                "model produced a non-finite output ({output})"
            )));
        }
        let prediction = Prediction::from_model_output(output);
        tracing::debug!(output, probability = prediction.probability, "inference done");
        Ok(prediction)
    }
}

fn check_len(input: &'static str, expected: usize, actual: usize) -> Result<(), PipelineError> {
    if expected == actual {
        Ok(())
    } else {
        Err(PipelineError::ShapeMismatch {
            input,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bundle::StandardScaler;
    use image::Luma;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic stand-in: mean image intensity, nudged by the first
    /// auxiliary value.
    pub(crate) struct MeanIntensity {
        pub len: Option<usize>,
        pub calls: AtomicUsize,
    }

    impl MeanIntensity {
        pub(crate) fn new() -> Self {
            Self {
                len: Some(FEATURE_LEN),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Classifier for MeanIntensity {
        fn input_len(&self) -> Option<usize> {
            self.len
        }

        fn classify(&self, image: &[f32], auxiliary: &[f32]) -> Result<f32, PipelineError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let mean = image.iter().sum::<f32>() / image.len() as f32;
            Ok(mean + auxiliary[0] * 0.001)
        }
    }

    fn identity_bundle() -> PreprocessingBundle {
        PreprocessingBundle::new(26.0, StandardScaler::IDENTITY)
    }

    #[test]
    fn white_image_scores_full_scale() {
        let ctx = InferenceContext::new(
            MeanIntensity::new(),
            PreprocessingBundle::new(26.0, StandardScaler { center: 26.0, scale: 1.0 }),
        );
        let img = GrayImage::from_pixel(64, 64, Luma([255]));
        let prediction = ctx.predict_image(&img).unwrap();
        assert!((prediction.probability - 100.0).abs() < 1e-4);
        assert_eq!(prediction.risk(DEFAULT_RISK_THRESHOLD), RiskLevel::High);
    }

    #[test]
    fn repeated_requests_are_deterministic() {
        let ctx = InferenceContext::new(MeanIntensity::new(), identity_bundle());
        let img = GrayImage::from_fn(200, 150, |x, y| Luma([((x ^ y) & 0xff) as u8]));
        let first = ctx.predict_image(&img).unwrap();
        let second = ctx.predict_image(&img).unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.model.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn shape_mismatch_stops_before_model_call() {
        let model = MeanIntensity {
            len: Some(1024),
            calls: AtomicUsize::new(0),
        };
        let ctx = InferenceContext::new(model, identity_bundle());
        let err = ctx
            .predict_image(&GrayImage::from_pixel(64, 64, Luma([0])))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ShapeMismatch {
                input: "image",
                expected: 1024,
                actual: FEATURE_LEN,
            }
        ));
        assert_eq!(ctx.model.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn short_image_vector_is_rejected() {
        let ctx = InferenceContext::new(MeanIntensity::new(), identity_bundle());
        let err = ctx.predict_features(&[0.5; 10]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { actual: 10, .. }));
    }

    #[test]
    fn output_above_one_is_not_clamped() {
        assert_eq!(Prediction::from_model_output(1.5).probability, 150.0);
        assert_eq!(Prediction::from_model_output(-0.25).probability, -25.0);
    }

    struct Fixed(f32);

    impl Classifier for Fixed {
        fn input_len(&self) -> Option<usize> {
            None
        }

        fn classify(&self, _image: &[f32], _auxiliary: &[f32]) -> Result<f32, PipelineError> {
            Ok(self.0)
        }
    }

    #[test]
    fn non_finite_output_is_an_inference_error() {
        for output in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let ctx = InferenceContext::new(Fixed(output), identity_bundle());
            let err = ctx.predict_features(&[0.0; FEATURE_LEN]).unwrap_err();
            assert!(matches!(err, PipelineError::Inference(_)), "{output}: {err:?}");
        }

        let report = crate::report::PredictionReport::from(
            InferenceContext::new(Fixed(f32::NAN), identity_bundle())
                .predict_features(&[0.0; FEATURE_LEN]),
        );
        assert!(report.is_error());
    }

    #[test]
    fn risk_threshold_is_exclusive() {
        assert_eq!(RiskLevel::classify(50.0, 50.0), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(50.01, 50.0), RiskLevel::High);
    }

    #[test]
    fn undecodable_bytes_are_invalid_image() {
        let ctx = InferenceContext::new(MeanIntensity::new(), identity_bundle());
        assert!(matches!(
            ctx.predict_bytes(b"\x89PNG broken"),
            Err(PipelineError::InvalidImage)
        ));
    }

    #[test]
    fn load_reports_missing_model_before_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            model_path: dir.path().join("missing.onnx"),
            bundle_path: dir.path().join("missing.json"),
        };
        let err = InferenceContext::load(&config).err().unwrap();
        assert_eq!(err.to_string(), "Model file not found");
    }

    #[test]
    fn load_reports_missing_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.onnx");
        std::fs::write(&model_path, b"not really onnx").unwrap();
        let config = PipelineConfig {
            model_path,
            bundle_path: dir.path().join("missing.json"),
        };
        let err = InferenceContext::load(&config).err().unwrap();
        assert_eq!(err.to_string(), "Preprocessing file not found");
    }
}

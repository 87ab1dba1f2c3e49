//! dfu-core: shared library for diabetic foot ulcer screening.
//!
//! Provides feature preparation, ONNX inference, the offline preprocessing
//! bundle builder, batch scan orchestration and result reporting used by
//! both the CLI and GUI frontends.

pub mod builder;
pub mod bundle;
pub mod error;
pub mod features;
pub mod inference;
pub mod pipeline;
pub mod report;
pub mod scan;

pub use bundle::{PreprocessingBundle, StandardScaler};
pub use error::{BuildError, PipelineError, Resource};
pub use inference::{Classifier, DfuModel};
pub use pipeline::{InferenceContext, PipelineConfig, Prediction, RiskLevel};
pub use report::PredictionReport;

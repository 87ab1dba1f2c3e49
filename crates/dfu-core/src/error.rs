//! Error types for the inference pipeline and the offline bundle builder.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Message reported when an input image cannot be opened or decoded.
pub const INVALID_IMAGE_MESSAGE: &str = "Image not found or could not be read";

/// Artifact the pipeline needs before it can serve a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Model,
    Preprocessing,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Model => f.write_str("Model"),
            Resource::Preprocessing => f.write_str("Preprocessing"),
        }
    }
}

/// Failures of a single inference request. All of them are terminal.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{resource} file not found")]
    ResourceNotFound { resource: Resource, path: PathBuf },

    #[error("Image not found or could not be read")]
    InvalidImage,

    #[error("{input} features have {actual} values but the model expects {expected}")]
    ShapeMismatch {
        input: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("failed to load model {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("invalid preprocessing bundle {}: {reason}", .path.display())]
    Bundle { path: PathBuf, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model produced no output")]
    EmptyOutput,
}

impl From<ort::Error> for PipelineError {
    fn from(err: ort::Error) -> Self {
        PipelineError::Inference(err.to_string())
    }
}

/// Failures of the offline bundle builder.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source spreadsheet not found at {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("failed to read spreadsheet {}: {source}", .path.display())]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to read CSV {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid synthetic distribution: {0}")]
    Distribution(#[from] rand_distr::NormalError),

    #[error("failed to encode bundle: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write bundle: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_messages_match_cli_contract() {
        let model = PipelineError::ResourceNotFound {
            resource: Resource::Model,
            path: PathBuf::from("m.onnx"),
        };
        let bundle = PipelineError::ResourceNotFound {
            resource: Resource::Preprocessing,
            path: PathBuf::from("p.json"),
        };
        assert_eq!(model.to_string(), "Model file not found");
        assert_eq!(bundle.to_string(), "Preprocessing file not found");
        assert_eq!(PipelineError::InvalidImage.to_string(), INVALID_IMAGE_MESSAGE);
    }
}

//! Preprocessing bundle: the persisted `{mean, scaler}` pair used to build
//! auxiliary features at inference time.
//!
//! The scaler mirrors scikit-learn's `StandardScaler` on a single feature:
//! population statistics, with a zero spread replaced by 1.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Resource};

/// Fitted linear standardization `y = (x - center) / scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub center: f64,
    pub scale: f64,
}

impl StandardScaler {
    pub const IDENTITY: StandardScaler = StandardScaler {
        center: 0.0,
        scale: 1.0,
    };

    /// Fit on a sample. Returns `None` for an empty sample.
    pub fn fit(values: &[f64]) -> Option<Self> {
        let center = mean(values)?;
        let variance = values
            .iter()
            .map(|v| {
                let d = v - center;
                d * d
            })
            .sum::<f64>()
            / values.len() as f64;

        let mut scale = variance.sqrt();
        if scale < 10.0 * f64::EPSILON {
            scale = 1.0;
        }

        Some(Self { center, scale })
    }

    pub fn transform(&self, x: f64) -> f64 {
        (x - self.center) / self.scale
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform(v)).collect()
    }
}

/// Arithmetic mean, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Immutable preprocessing artifact produced by the bundle builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingBundle {
    pub mean: f64,
    pub scaler: StandardScaler,
    /// Number of values the scaler was fitted on.
    #[serde(default)]
    pub samples: usize,
    /// Whether the synthetic fallback distribution was used.
    #[serde(default)]
    pub synthetic: bool,
}

impl PreprocessingBundle {
    pub fn new(mean: f64, scaler: StandardScaler) -> Self {
        Self {
            mean,
            scaler,
            samples: 0,
            synthetic: false,
        }
    }

    /// Read and validate a bundle from JSON.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let data = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::ResourceNotFound {
                resource: Resource::Preprocessing,
                path: path.to_path_buf(),
            },
            _ => PipelineError::Bundle {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        let bundle: PreprocessingBundle =
            serde_json::from_str(&data).map_err(|e| PipelineError::Bundle {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        bundle.validate().map_err(|reason| PipelineError::Bundle {
            path: path.to_path_buf(),
            reason,
        })?;

        Ok(bundle)
    }

    fn validate(&self) -> Result<(), String> {
        if !self.mean.is_finite() {
            return Err(format!("mean must be finite, got {}", self.mean));
        }
        if !self.scaler.center.is_finite() {
            return Err(format!(
                "scaler center must be finite, got {}",
                self.scaler.center
            ));
        }
        if !self.scaler.scale.is_finite() || self.scaler.scale == 0.0 {
            return Err(format!(
                "scaler scale must be finite and non-zero, got {}",
                self.scaler.scale
            ));
        }
        Ok(())
    }
}

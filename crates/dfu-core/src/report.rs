//! Output formatting for predictions and scan results.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::PipelineError;
use crate::pipeline::{Prediction, RiskLevel};

/// Message for a `predict` invocation without an image argument.
pub const MISSING_IMAGE_ARG: &str = "Please provide an image file path";

/// Single-image result as printed by `predict`:
/// `{"prediction": <float>}` or `{"error": <string>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionReport {
    Prediction { prediction: f64 },
    Error { error: String },
}

impl PredictionReport {
    pub fn error(message: impl Into<String>) -> Self {
        PredictionReport::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PredictionReport::Error { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"error":"failed to encode result: {e}"}}"#)
        })
    }
}

impl From<Result<Prediction, PipelineError>> for PredictionReport {
    fn from(result: Result<Prediction, PipelineError>) -> Self {
        match result {
            Ok(p) => PredictionReport::Prediction {
                prediction: p.probability,
            },
            Err(e) => PredictionReport::error(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    pub fn is_high_risk(&self) -> bool {
        self.risk == Some(RiskLevel::High)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}. Use 'text' or 'json'.")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub high_risk: usize,
    pub low_risk: usize,
    pub errors: usize,
}

impl ScanSummary {
    pub fn of(results: &[ScanResult]) -> Self {
        let high_risk = results.iter().filter(|r| r.is_high_risk()).count();
        let errors = results.iter().filter(|r| r.error.is_some()).count();
        Self {
            total: results.len(),
            high_risk,
            low_risk: results.len() - high_risk - errors,
            errors,
        }
    }
}

pub fn render_results(results: &[ScanResult], format: OutputFormat, threshold: f64) -> String {
    match format {
        OutputFormat::Text => render_text(results, threshold),
        OutputFormat::Json => render_json(results),
    }
}

pub fn print_results(results: &[ScanResult], format: OutputFormat, threshold: f64) {
    println!("{}", render_results(results, format, threshold));
}

fn render_text(results: &[ScanResult], threshold: f64) -> String {
    use std::fmt::Write;

    let summary = ScanSummary::of(results);
    let rule = "=".repeat(70);
    let mut out = String::new();

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "DFU SCREENING RESULTS (threshold: {threshold:.2}%)");
    let _ = writeln!(out, "{rule}");

    let high: Vec<_> = results.iter().filter(|r| r.is_high_risk()).collect();
    if !high.is_empty() {
        let _ = writeln!(out, "\nHIGH RISK ({}):", high.len());
        for r in &high {
            let p = r.probability.unwrap_or_default();
            let _ = writeln!(out, "  [{p:6.2}%] {}", r.path.display());
        }
    }

    let low: Vec<_> = results
        .iter()
        .filter(|r| r.risk == Some(RiskLevel::Low))
        .collect();
    if !low.is_empty() {
        let _ = writeln!(out, "\nLOW RISK ({}):", low.len());
        for r in &low {
            let p = r.probability.unwrap_or_default();
            let _ = writeln!(out, "  [{p:6.2}%] {}", r.path.display());
        }
    }

    let errors: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    if !errors.is_empty() {
        let _ = writeln!(out, "\nERRORS ({}):", errors.len());
        for r in &errors {
            let err = r.error.as_deref().unwrap_or("unknown");
            let _ = writeln!(out, "  [ERR    ] {} -- {}", r.path.display(), err);
        }
    }

    let _ = writeln!(out, "\nSUMMARY:");
    let _ = writeln!(out, "  Total images: {}", summary.total);
    let _ = writeln!(out, "  High risk:    {}", summary.high_risk);
    let _ = writeln!(out, "  Low risk:     {}", summary.low_risk);
    let _ = writeln!(out, "  Errors:       {}", summary.errors);
    let _ = write!(out, "{rule}");
    out
}

fn render_json(results: &[ScanResult]) -> String {
    let output = serde_json::json!({
        "results": results,
        "summary": ScanSummary::of(results),
    });
    serde_json::to_string_pretty(&output).unwrap_or_default()
}

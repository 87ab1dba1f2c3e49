//! Batch scan over files and directories with progress tracking for both
//! CLI and GUI use.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::PipelineError;
use crate::inference::Classifier;
use crate::pipeline::{InferenceContext, PipelineConfig, RiskLevel, DEFAULT_RISK_THRESHOLD};
use crate::report::ScanResult;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Configuration for a scan run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub pipeline: PipelineConfig,
    pub target_paths: Vec<PathBuf>,
    /// Percentage above which an image is flagged high risk.
    pub threshold: f64,
}

impl ScanConfig {
    pub fn new(pipeline: PipelineConfig, target_paths: Vec<PathBuf>) -> Self {
        Self {
            pipeline,
            target_paths,
            threshold: DEFAULT_RISK_THRESHOLD,
        }
    }
}

/// Atomic progress counters, readable while a scan runs.
#[derive(Debug, Default)]
pub struct ScanProgress {
    pub total_files: AtomicUsize,
    pub scanned_files: AtomicUsize,
    pub high_risk_count: AtomicUsize,
    pub error_count: AtomicUsize,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Check if a path has a known image extension.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expand targets into image files. Directories are walked and filtered by
/// extension; explicitly named files are kept as given so unreadable ones
/// surface as error rows.
pub fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable entry");
                        continue;
                    }
                };
                let p = entry.into_path();
                if p.is_file() && is_image(&p) {
                    files.push(p);
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    files
}

/// Run a full scan: load the pipeline once, then predict every file.
/// Blocking; call from a background thread in interactive front ends.
pub fn run_scan(config: &ScanConfig, progress: &ScanProgress) -> Result<Vec<ScanResult>, PipelineError> {
    let context = InferenceContext::load(&config.pipeline)?;
    let files = collect_files(&config.target_paths);
    Ok(scan_files(&context, &files, config.threshold, progress))
}

/// Predict each file in parallel with a shared context. Per-file failures
/// become error rows. Results keep the input order.
pub fn scan_files<M: Classifier>(
    context: &InferenceContext<M>,
    files: &[PathBuf],
    threshold: f64,
    progress: &ScanProgress,
) -> Vec<ScanResult> {
    progress.total_files.store(files.len(), Ordering::Relaxed);
    tracing::info!(files = files.len(), threshold, "scan started");

    files
        .par_iter()
        .map(|path| {
            let result = match context.predict_path(path) {
                Ok(prediction) => {
                    let risk = prediction.risk(threshold);
                    if risk == RiskLevel::High {
                        progress.high_risk_count.fetch_add(1, Ordering::Relaxed);
                    }
                    ScanResult {
                        path: path.clone(),
                        probability: Some(prediction.probability),
                        risk: Some(risk),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "prediction failed");
                    progress.error_count.fetch_add(1, Ordering::Relaxed);
                    ScanResult {
                        path: path.clone(),
                        probability: None,
                        risk: None,
                        error: Some(e.to_string()),
                    }
                }
            };

            progress.scanned_files.fetch_add(1, Ordering::Relaxed);
            result
        })
        .collect()
}

//! DFU screening CLI.
//!
//! Usage:
//!   dfu-predict predict foot.png
//!   dfu-predict predict foot.png --model model.onnx --bundle preprocessing.json
//!   dfu-predict scan /path/to/images --format json --threshold 60
//!   dfu-predict build-bundle --source "Plantar Thermogram Database.xlsx" --output preprocessing.json

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dfu_core::builder::{build_bundle, BuildConfig};
use dfu_core::pipeline::{
    InferenceContext, PipelineConfig, DEFAULT_BUNDLE_PATH, DEFAULT_MODEL_PATH,
    DEFAULT_RISK_THRESHOLD,
};
use dfu_core::report::{print_results, OutputFormat, PredictionReport, MISSING_IMAGE_ARG};
use dfu_core::scan::{run_scan, ScanConfig, ScanProgress};

#[derive(Parser)]
#[command(name = "dfu-predict")]
#[command(about = "Diabetic foot ulcer probability from a plantar image", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity on stderr (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Score one image and print {"prediction": ..} or {"error": ..} as JSON
    Predict {
        /// Image to score
        image: PathBuf,

        #[command(flatten)]
        artifacts: ArtifactArgs,
    },

    /// Score every image under the given files or directories
    Scan {
        /// Paths to scan (files or directories)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        artifacts: ArtifactArgs,

        /// Probability (0-100) above which an image is flagged high risk
        #[arg(short, long, default_value_t = DEFAULT_RISK_THRESHOLD)]
        threshold: f64,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Fit the preprocessing bundle from a temperature spreadsheet
    BuildBundle {
        /// Spreadsheet of historical readings (.xlsx, .xls, .ods or .csv)
        #[arg(short, long)]
        source: PathBuf,

        /// Where to write the bundle JSON
        #[arg(short, long, default_value = DEFAULT_BUNDLE_PATH)]
        output: PathBuf,

        /// Seed for the synthetic fallback sample
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args)]
struct ArtifactArgs {
    /// Path to the ONNX model file
    #[arg(short, long, env = "DFU_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,

    /// Path to the preprocessing bundle JSON
    #[arg(short, long, env = "DFU_BUNDLE_PATH", default_value = DEFAULT_BUNDLE_PATH)]
    bundle: PathBuf,
}

impl From<ArtifactArgs> for PipelineConfig {
    fn from(args: ArtifactArgs) -> Self {
        PipelineConfig {
            model_path: args.model,
            bundle_path: args.bundle,
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// `predict` keeps its JSON contract even for argument errors.
fn invoked_predict() -> bool {
    std::env::args()
        .skip(1)
        .find(|a| !a.starts_with('-'))
        .is_some_and(|a| a == "predict")
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let argument_error = !matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            );
            if argument_error && invoked_predict() {
                let message = match err.kind() {
                    ErrorKind::MissingRequiredArgument => MISSING_IMAGE_ARG.to_string(),
                    _ => err.kind().to_string(),
                };
                println!("{}", PredictionReport::error(message).to_json());
                return ExitCode::FAILURE;
            }
            if !argument_error {
                err.exit();
            }
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.verbose);

    match cli.command {
        Command::Predict { image, artifacts } => predict(&image, &artifacts.into()),
        Command::Scan {
            paths,
            artifacts,
            threshold,
            format,
        } => exit_with(scan(paths, artifacts.into(), threshold, format)),
        Command::BuildBundle {
            source,
            output,
            seed,
        } => exit_with(build(BuildConfig {
            source,
            output,
            seed,
        })),
    }
}

fn predict(image: &Path, config: &PipelineConfig) -> ExitCode {
    let report = match InferenceContext::load(config) {
        Ok(context) => PredictionReport::from(context.predict_path(image)),
        Err(e) => PredictionReport::from(Err(e)),
    };

    if let PredictionReport::Error { error } = &report {
        tracing::info!(image = %image.display(), error, "prediction failed");
    }
    println!("{}", report.to_json());

    if report.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn scan(
    paths: Vec<PathBuf>,
    pipeline: PipelineConfig,
    threshold: f64,
    format: OutputFormat,
) -> Result<()> {
    eprintln!("[*] Loading model from {}...", pipeline.model_path.display());
    eprintln!("[*] Loading bundle from {}...", pipeline.bundle_path.display());

    let config = ScanConfig {
        pipeline,
        target_paths: paths,
        threshold,
    };
    let progress = ScanProgress::new();

    eprintln!("[*] Scanning...");
    let results = run_scan(&config, &progress).context("scan failed")?;

    let total = progress.total_files.load(Ordering::Relaxed);
    eprintln!("[*] Scanned {} images", total);

    if results.is_empty() {
        eprintln!("[*] No images to scan.");
        return Ok(());
    }

    print_results(&results, format, threshold);
    Ok(())
}

fn build(config: BuildConfig) -> Result<()> {
    let summary = build_bundle(&config)
        .with_context(|| format!("could not build bundle from {}", config.source.display()))?;

    if summary.synthetic {
        println!(
            "Warning: no temperature columns found; used {} synthetic samples",
            summary.samples
        );
    } else {
        println!(
            "Found {} temperature columns with {} data points",
            summary.columns, summary.samples
        );
    }
    println!("Successfully created {}", summary.output.display());
    println!("Calculated mean: {}", summary.mean);
    Ok(())
}

fn exit_with(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

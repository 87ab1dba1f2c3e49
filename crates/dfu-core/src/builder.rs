//! Offline preprocessing bundle builder.
//!
//! Reads historical plantar temperature readings from a spreadsheet, fits
//! the scaler and writes the bundle JSON. Temperature columns are the ones
//! with an empty header cell whose data cells are all numeric. With no such
//! column the builder falls back to a synthetic Normal(26.0, 0.5) sample.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::bundle::{self, PreprocessingBundle, StandardScaler};
use crate::error::BuildError;

pub const SYNTHETIC_MEAN: f64 = 26.0;
pub const SYNTHETIC_STD_DEV: f64 = 0.5;
pub const SYNTHETIC_SAMPLES: usize = 1000;

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Seed for the synthetic fallback; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub output: PathBuf,
    pub columns: usize,
    pub samples: usize,
    pub mean: f64,
    pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Number(f64),
    Text,
}

/// Temperature values pulled from a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSamples {
    pub columns: usize,
    pub values: Vec<f64>,
}

/// Build and persist a bundle. Nothing is written unless every step succeeds.
pub fn build_bundle(config: &BuildConfig) -> Result<BuildSummary, BuildError> {
    if !config.source.is_file() {
        return Err(BuildError::SourceMissing(config.source.clone()));
    }

    let samples = read_temperature_samples(&config.source)?;
    let (values, synthetic) = if samples.columns > 0 && !samples.values.is_empty() {
        tracing::info!(
            columns = samples.columns,
            samples = samples.values.len(),
            "found temperature columns"
        );
        (samples.values, false)
    } else {
        tracing::warn!(
            source = %config.source.display(),
            mean = SYNTHETIC_MEAN,
            std_dev = SYNTHETIC_STD_DEV,
            "no temperature columns found, using synthetic thermogram temperatures"
        );
        (synthetic_samples(config.seed)?, true)
    };

    let bundle = fit_bundle(&values, synthetic);
    write_atomic(&config.output, &serde_json::to_vec_pretty(&bundle)?)?;

    Ok(BuildSummary {
        output: config.output.clone(),
        columns: if synthetic { 0 } else { samples.columns },
        samples: values.len(),
        mean: bundle.mean,
        synthetic,
    })
}

/// Fit a bundle on a non-empty sample.
pub fn fit_bundle(values: &[f64], synthetic: bool) -> PreprocessingBundle {
    let mean = bundle::mean(values).unwrap_or(SYNTHETIC_MEAN);
    let scaler = StandardScaler::fit(values).unwrap_or(StandardScaler::IDENTITY);
    PreprocessingBundle {
        mean,
        scaler,
        samples: values.len(),
        synthetic,
    }
}

/// Draw the fallback sample.
pub fn synthetic_samples(seed: Option<u64>) -> Result<Vec<f64>, BuildError> {
    let normal = Normal::new(SYNTHETIC_MEAN, SYNTHETIC_STD_DEV)?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    Ok(normal.sample_iter(&mut rng).take(SYNTHETIC_SAMPLES).collect())
}

/// Locate temperature columns and flatten their finite values row by row.
pub fn read_temperature_samples(path: &Path) -> Result<TemperatureSamples, BuildError> {
    let table = read_table(path)?;
    Ok(extract_samples(&table))
}

fn extract_samples(table: &[Vec<Cell>]) -> TemperatureSamples {
    let columns = temperature_columns(table);
    let values = table
        .iter()
        .skip(1)
        .flat_map(|row| {
            columns.iter().filter_map(move |&c| match row.get(c) {
                Some(Cell::Number(v)) if v.is_finite() => Some(*v),
                _ => None,
            })
        })
        .collect();

    TemperatureSamples {
        columns: columns.len(),
        values,
    }
}

fn temperature_columns(table: &[Vec<Cell>]) -> Vec<usize> {
    let Some(header) = table.first() else {
        return Vec::new();
    };
    let width = table.iter().map(Vec::len).max().unwrap_or(0);

    (0..width)
        .filter(|&c| matches!(header.get(c), None | Some(Cell::Empty)))
        .filter(|&c| {
            let mut numeric = false;
            for row in table.iter().skip(1) {
                match row.get(c) {
                    Some(Cell::Number(v)) => numeric |= v.is_finite(),
                    Some(Cell::Text) => return false,
                    Some(Cell::Empty) | None => {}
                }
            }
            numeric
        })
        .collect()
}

fn read_table(path: &Path) -> Result<Vec<Vec<Cell>>, BuildError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        read_csv(path)
    } else {
        read_workbook(path)
    }
}

fn read_csv(path: &Path) -> Result<Vec<Vec<Cell>>, BuildError> {
    let csv_err = |source| BuildError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut table = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        table.push(record.iter().map(parse_field).collect());
    }
    Ok(table)
}

fn parse_field(field: &str) -> Cell {
    let field = field.trim();
    if field.is_empty() {
        return Cell::Empty;
    }
    match field.parse::<f64>() {
        Ok(v) => Cell::Number(v),
        Err(_) => Cell::Text,
    }
}

/// First worksheet of any workbook format calamine understands.
fn read_workbook(path: &Path) -> Result<Vec<Vec<Cell>>, BuildError> {
    let sheet_err = |source| BuildError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(sheet_err)?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range.map_err(sheet_err)?;

    Ok(range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Empty => Cell::Empty,
                    Data::Float(f) => Cell::Number(*f),
                    Data::Int(i) => Cell::Number(*i as f64),
                    Data::String(s) if s.trim().is_empty() => Cell::Empty,
                    _ => Cell::Text,
                })
                .collect()
        })
        .collect())
}

/// Write via a temp file in the destination directory, then rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

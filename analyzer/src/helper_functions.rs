use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

/// Directory all relative input and output paths are resolved against.
///
/// `PROJECT_ROOT` wins when set; otherwise the current directory is used.
pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

/// Snapshot of the inputs and thresholds a run used, written next to its outputs.
pub fn write_run_config<T: Serialize>(output_dir: &Path, config: &T) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let config_path = output_dir.join("run_config.json");
    fs::write(&config_path, serde_json::to_string_pretty(config)?)
        .with_context(|| format!("writing {}", config_path.display()))?;

    info!("Run configuration written to {}", config_path.display());
    Ok(config_path)
}

/// Write a frame as tab-separated text.
pub fn dataframe_to_tsv(df: &mut DataFrame, path: &Path, include_header: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(include_header)
        .with_separator(b'\t')
        .finish(df)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Quantile with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    let series = Series::new(PlSmallStr::from("values"), values);
    series
        .f64()?
        .quantile(q, QuantileMethod::Linear)?
        .with_context(|| format!("quantile {q} of an empty series"))
}

//! CSV output for benchmark records

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::{BenchError, Result};
use crate::metrics::{ModelMetrics, ResultRecord};

pub const RESULTS_FILE: &str = "results.csv";
pub const MODEL_METRICS_FILE: &str = "model_metrics.csv";

/// Serialize `records` to a comma-separated file at `path`.
///
/// The header row comes from the record's field names, in declaration
/// order. The parent directory is created first. An empty slice is an
/// error and leaves no file behind.
pub fn write_records<T: Serialize>(records: &[T], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if records.is_empty() {
        return Err(BenchError::EmptyRecords(path.to_path_buf()));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BenchError::io(parent, e))?;
    }

    let csv_err = |source: csv::Error| BenchError::Csv { path: path.to_path_buf(), source };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| BenchError::io(path, e))?;
    Ok(())
}

/// Directory name for a model's outputs: every `/` becomes `-`.
pub fn output_dir_name(model: &str) -> String {
    model.replace('/', "-")
}

/// Locations of the files written for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub dir: PathBuf,
    pub results: PathBuf,
    pub model_metrics: PathBuf,
}

impl ReportPaths {
    pub fn new(output_root: impl AsRef<Path>, model: &str) -> Self {
        let dir = output_root.as_ref().join(output_dir_name(model));
        Self {
            results: dir.join(RESULTS_FILE),
            model_metrics: dir.join(MODEL_METRICS_FILE),
            dir,
        }
    }
}

/// Write `results.csv` and then `model_metrics.csv` for `model`.
pub fn write_report(
    output_root: impl AsRef<Path>,
    model: &str,
    results: &[ResultRecord],
    model_metrics: &ModelMetrics,
) -> Result<ReportPaths> {
    let paths = ReportPaths::new(output_root, model);
    std::fs::create_dir_all(&paths.dir).map_err(|e| BenchError::io(&paths.dir, e))?;

    write_records(results, &paths.results)?;
    info!("Wrote {} result row(s) to {}", results.len(), paths.results.display());

    write_records(std::slice::from_ref(model_metrics), &paths.model_metrics)?;
    info!("Wrote model metrics to {}", paths.model_metrics.display());

    Ok(paths)
}

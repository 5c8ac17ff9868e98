//! Error types for the benchmark harness

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Harness error types
#[derive(Error, Debug)]
pub enum BenchError {
    /// Reading or writing a file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV serialization failed
    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// No records to write, so no header row can be derived
    #[error("cannot write {0}: record set is empty")]
    EmptyRecords(PathBuf),

    /// Resident memory of the current process could not be read
    #[error("memory sampling failed: {0}")]
    Memory(String),

    /// The generation backend failed on an instruction
    #[error("generation failed for instruction #{index}: {source}")]
    Generation {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl BenchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

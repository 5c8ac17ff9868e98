//! Benchmark records
//!
//! Field order and serde names define the CSV columns.

use serde::{Deserialize, Serialize};

use crate::generator::TextGenerator;

/// Measurements for one instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "Prompt")]
    pub prompt: String,
    #[serde(rename = "Instruction")]
    pub instruction: String,
    #[serde(rename = "Response")]
    pub response: String,
    /// Wall-clock seconds spent in the generation call
    #[serde(rename = "TimeTaken")]
    pub time_taken: f64,
    /// Resident memory delta across the call, in MB. Not clamped.
    #[serde(rename = "MemoryUsage")]
    pub memory_usage: f64,
}

/// Static properties of the loaded model, captured once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Resident memory after the model was loaded, in MB
    #[serde(rename = "ModelMemoryUsage")]
    pub model_memory_usage: f64,
    /// Number of parameter tensors
    #[serde(rename = "TotalLayers")]
    pub total_layers: usize,
    #[serde(rename = "HiddenSize")]
    pub hidden_size: usize,
}

impl ModelMetrics {
    pub fn capture<G: TextGenerator + ?Sized>(generator: &G, model_memory_usage: f64) -> Self {
        Self {
            model_memory_usage,
            total_layers: generator.parameter_count(),
            hidden_size: generator.hidden_size(),
        }
    }
}

/// Aggregate view over a run, for the end-of-run log
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub count: usize,
    pub total_time: f64,
    pub mean_time: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub total_memory_delta: f64,
}

impl RunSummary {
    /// `None` for an empty run.
    pub fn from_records(records: &[ResultRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let total_time: f64 = records.iter().map(|r| r.time_taken).sum();
        let min_time = records.iter().map(|r| r.time_taken).fold(f64::INFINITY, f64::min);
        let max_time = records.iter().map(|r| r.time_taken).fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            count: records.len(),
            total_time,
            mean_time: total_time / records.len() as f64,
            min_time,
            max_time,
            total_memory_delta: records.iter().map(|r| r.memory_usage).sum(),
        })
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} call(s) in {:.2}s (mean {:.3}s, min {:.3}s, max {:.3}s), memory delta {:+.2} MB",
            self.count, self.total_time, self.mean_time, self.min_time, self.max_time, self.total_memory_delta
        )
    }
}

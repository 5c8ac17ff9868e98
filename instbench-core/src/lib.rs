//! Instbench Core - measurement harness for LLM instruction benchmarks
//!
//! This crate implements:
//! - Instruction loading and prompt formatting
//! - Per-call wall-clock and resident-memory measurement
//! - CSV reports for per-instruction results and model properties
//! - A LLaMA text generator via candle-transformers, behind [`TextGenerator`]

pub mod config;
pub mod error;
pub mod instructions;
pub mod memory;
pub mod metrics;
pub mod report;
pub mod generator;
pub mod harness;
pub mod sampling;
pub mod model;
pub mod engine;

pub use config::{BenchConfig, DEFAULT_INSTRUCTIONS_FILE};
pub use error::{BenchError, Result};
pub use instructions::{load_instructions, parse_instructions, PromptTemplate, DEFAULT_PROMPT_TEMPLATE};
pub use memory::{MemoryProbe, ProcessMemory};
pub use metrics::{ModelMetrics, ResultRecord, RunSummary};
pub use report::{output_dir_name, write_records, write_report, ReportPaths, MODEL_METRICS_FILE, RESULTS_FILE};
pub use generator::TextGenerator;
pub use harness::{measure_instruction, run_instructions};
pub use sampling::{GenerationConfig, SamplingOverrides, SamplingParams};
pub use model::{load_model, select_device, LoadedModel, ModelConfig, ModelFiles};
pub use engine::{EngineConfig, EngineStats, FinishReason, GenerationResult, InferenceEngine};

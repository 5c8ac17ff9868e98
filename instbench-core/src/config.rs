//! Harness configuration

use std::path::PathBuf;

use crate::instructions::PromptTemplate;

/// Default location of the instruction file
pub const DEFAULT_INSTRUCTIONS_FILE: &str = "instructions.txt";

/// Settings for one benchmark run, independent of the model backend
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Model directory or hub id; also names the output directory
    pub model: String,
    /// Newline-delimited instruction file
    pub instructions_path: PathBuf,
    /// Directory under which the per-model output directory is created
    pub output_root: PathBuf,
    pub prompt_template: PromptTemplate,
}

impl BenchConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            instructions_path: PathBuf::from(DEFAULT_INSTRUCTIONS_FILE),
            output_root: PathBuf::from("."),
            prompt_template: PromptTemplate::default(),
        }
    }
}

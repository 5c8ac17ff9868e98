//! Instruction loading and prompt formatting

use std::path::Path;

use tracing::debug;

use crate::error::{BenchError, Result};

/// Prompt template used when none is configured
pub const DEFAULT_PROMPT_TEMPLATE: &str = "<|begin_of_text|>{}";

/// Read a newline-delimited instruction file.
///
/// Every line is trimmed and lines that end up empty are dropped. The
/// remaining lines keep their file order.
pub fn load_instructions(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
    let instructions = parse_instructions(&contents);
    debug!("Loaded {} instruction(s) from {}", instructions.len(), path.display());
    Ok(instructions)
}

/// Split raw text into non-blank, trimmed instructions.
pub fn parse_instructions(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// A prompt template with a single `{}` placeholder for the instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute the instruction for the first `{}`. A template without a
    /// placeholder gets the instruction appended.
    pub fn format(&self, instruction: &str) -> String {
        if self.template.contains("{}") {
            self.template.replacen("{}", instruction, 1)
        } else {
            format!("{}{}", self.template, instruction)
        }
    }
}

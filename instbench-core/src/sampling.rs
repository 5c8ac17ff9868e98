//! Sampling parameters and the model's generation defaults

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Sampling parameters for generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_new_tokens: usize,
    /// 0.0 selects greedy decoding
    pub temperature: f64,
    pub top_p: Option<f64>,
    pub top_k: Option<usize>,
    pub stop_tokens: Vec<u32>,
    pub seed: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 100,
            temperature: 0.6,
            top_p: Some(0.9),
            top_k: None,
            stop_tokens: vec![],
            seed: 42,
        }
    }
}

/// The subset of `generation_config.json` that affects sampling
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub do_sample: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl GenerationConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl SamplingParams {
    /// Overlay a model's generation defaults. `do_sample: false` forces
    /// greedy decoding; a `top_k` of 0 or a `top_p` of 1.0 means disabled.
    pub fn with_generation_config(mut self, gen: &GenerationConfig) -> Self {
        if let Some(t) = gen.temperature {
            self.temperature = t;
        }
        if let Some(p) = gen.top_p {
            self.top_p = nucleus(p);
        }
        if let Some(k) = gen.top_k {
            self.top_k = cutoff(k);
        }
        if gen.do_sample == Some(false) {
            self.temperature = 0.0;
        }
        self
    }
}

/// Explicit settings that take precedence over a model's defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingOverrides {
    pub max_new_tokens: Option<usize>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<usize>,
    pub seed: Option<u64>,
}

impl SamplingOverrides {
    pub fn apply(&self, params: SamplingParams) -> SamplingParams {
        SamplingParams {
            max_new_tokens: self.max_new_tokens.unwrap_or(params.max_new_tokens),
            temperature: self.temperature.unwrap_or(params.temperature),
            top_p: self.top_p.map_or(params.top_p, nucleus),
            top_k: self.top_k.map_or(params.top_k, cutoff),
            seed: self.seed.unwrap_or(params.seed),
            ..params
        }
    }
}

/// `top_p >= 1.0` keeps the whole distribution
fn nucleus(p: f64) -> Option<f64> {
    (p < 1.0).then_some(p)
}

/// `top_k == 0` keeps every token
fn cutoff(k: usize) -> Option<usize> {
    (k > 0).then_some(k)
}

//! Inference engine - runs real forward passes for the benchmark
//!
//! Wraps a loaded LLaMA-family model behind [`TextGenerator`]. One engine is
//! built per run and reused for every prompt.

use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use candle_transformers::models::llama::{Cache, Config, Llama};
use std::time::Instant;
use tracing::{debug, info};

use crate::generator::TextGenerator;
use crate::model::{create_logits_processor, load_model, LoadedModel, ModelConfig};
use crate::sampling::{SamplingOverrides, SamplingParams};

/// Configuration for the inference engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model configuration
    pub model_config: ModelConfig,
    /// Applied on top of the model's generation defaults
    pub sampling: SamplingOverrides,
    /// Repeat penalty (1.0 = no penalty)
    pub repeat_penalty: f32,
    /// Context size for repeat penalty
    pub repeat_last_n: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_config: ModelConfig::default(),
            sampling: SamplingOverrides::default(),
            repeat_penalty: 1.0,
            repeat_last_n: 64,
        }
    }
}

impl EngineConfig {
    pub fn with_model(model_config: ModelConfig) -> Self {
        Self {
            model_config,
            ..Default::default()
        }
    }
}

/// Engine statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub device: String,
    pub model: String,
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub parameter_tensors: usize,
    pub dtype: String,
}

/// Result of a single generation
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Generated tokens
    pub tokens: Vec<u32>,
    /// Prompt followed by the decoded completion
    pub text: String,
    /// Number of prompt tokens
    pub prompt_tokens: usize,
    /// Number of generated tokens
    pub generated_tokens: usize,
    /// Tokens per second
    pub tokens_per_second: f64,
    /// Finish reason
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum FinishReason {
    Length,
    Stop,
}

/// Inference engine that performs actual model execution
pub struct InferenceEngine {
    config: EngineConfig,
    device: Device,
    model: LoadedModel,
    sampling: SamplingParams,
}

impl InferenceEngine {
    /// Create a new inference engine with the specified model
    pub fn new(config: EngineConfig, device: Device) -> Result<Self> {
        info!("Initializing inference engine on {:?}...", device);
        let model = load_model(&config.model_config, &device)?;

        let defaults = match &model.generation_config {
            Some(gen) => SamplingParams::default().with_generation_config(gen),
            None => SamplingParams::default(),
        };
        let sampling = config.sampling.apply(defaults);
        debug!("Sampling parameters: {:?}", sampling);

        Ok(Self {
            config,
            device,
            model,
            sampling,
        })
    }

    /// Get the device being used
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn sampling(&self) -> &SamplingParams {
        &self.sampling
    }

    pub fn model(&self) -> &LoadedModel {
        &self.model
    }

    /// Encode a prompt to tokens
    pub fn encode(&self, prompt: &str) -> Result<Vec<u32>> {
        self.model
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow!("Tokenization error: {}", e))
            .map(|enc| enc.get_ids().to_vec())
    }

    /// Decode tokens to text
    pub fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.model
            .tokenizer
            .decode(tokens, true)
            .map_err(|e| anyhow!("Decode error: {}", e))
    }

    /// Generate a completion for `prompt` with explicit sampling parameters
    pub fn generate_with(&self, prompt: &str, params: &SamplingParams) -> Result<GenerationResult> {
        let prompt_tokens = self.encode(prompt)?;
        let decoder = Decoder {
            model: &self.model.model,
            config: &self.model.config,
            device: &self.device,
            dtype: self.model.dtype,
            repeat_penalty: self.config.repeat_penalty,
            repeat_last_n: self.config.repeat_last_n,
        };
        decoder.generate(
            prompt,
            prompt_tokens,
            params,
            |token| self.model.is_eos(token),
            |tokens| self.decode(tokens),
        )
    }

    /// Get engine statistics
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            device: format!("{:?}", self.device),
            model: self.config.model_config.model.clone(),
            vocab_size: self.model.vocab_size(),
            hidden_size: self.model.hidden_size(),
            num_layers: self.model.num_layers(),
            parameter_tensors: self.model.parameter_count,
            dtype: format!("{:?}", self.model.dtype),
        }
    }
}

/// The prefill/decode loop over a LLaMA model, independent of tokenizer
struct Decoder<'a> {
    model: &'a Llama,
    config: &'a Config,
    device: &'a Device,
    dtype: DType,
    repeat_penalty: f32,
    repeat_last_n: usize,
}

impl Decoder<'_> {
    fn generate<E, D>(
        &self,
        prompt: &str,
        prompt_tokens: Vec<u32>,
        params: &SamplingParams,
        is_eos: E,
        decode: D,
    ) -> Result<GenerationResult>
    where
        E: Fn(u32) -> bool,
        D: FnOnce(&[u32]) -> Result<String>,
    {
        let prompt_len = prompt_tokens.len();
        let mut tokens = prompt_tokens;
        let mut generated_tokens = Vec::with_capacity(params.max_new_tokens);
        let mut finish_reason = FinishReason::Length;

        let mut logits_processor =
            create_logits_processor(params.seed, params.temperature, params.top_p, params.top_k);
        let mut cache = Cache::new(true, self.dtype, self.config, self.device)?;

        let start_time = Instant::now();
        let mut index_pos = 0;

        // First step prefills the whole prompt; later steps feed one token
        // against the KV cache.
        for step in 0..params.max_new_tokens {
            let context = if step == 0 { &tokens[..] } else { &tokens[tokens.len() - 1..] };
            let input = Tensor::new(context, self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, index_pos, &mut cache)?.squeeze(0)?;
            let logits = apply_repeat_penalty(logits, &tokens, self.repeat_penalty, self.repeat_last_n)?;

            index_pos += context.len();
            let next_token = logits_processor.sample(&logits)?;

            if params.stop_tokens.contains(&next_token) || is_eos(next_token) {
                finish_reason = FinishReason::Stop;
                break;
            }

            generated_tokens.push(next_token);
            tokens.push(next_token);
        }

        let gen_count = generated_tokens.len();
        let elapsed = start_time.elapsed().as_secs_f64();
        let tokens_per_second = if elapsed > 0.0 { gen_count as f64 / elapsed } else { 0.0 };
        let text = format!("{}{}", prompt, decode(&generated_tokens)?);

        Ok(GenerationResult {
            tokens: generated_tokens,
            text,
            prompt_tokens: prompt_len,
            generated_tokens: gen_count,
            tokens_per_second,
            finish_reason,
        })
    }
}

/// Penalize the last `last_n` tokens; a penalty of 1.0 leaves logits untouched
fn apply_repeat_penalty(logits: Tensor, tokens: &[u32], penalty: f32, last_n: usize) -> Result<Tensor> {
    if penalty == 1.0 {
        return Ok(logits);
    }
    let start_at = tokens.len().saturating_sub(last_n);
    Ok(candle_transformers::utils::apply_repeat_penalty(&logits, penalty, &tokens[start_at..])?)
}

impl TextGenerator for InferenceEngine {
    fn generate(&mut self, prompt: &str) -> Result<String> {
        let result = self.generate_with(prompt, &self.sampling)?;
        debug!(
            "Generated {} tokens ({} prompt) at {:.2} tok/s, finish: {:?}",
            result.generated_tokens, result.prompt_tokens, result.tokens_per_second, result.finish_reason
        );
        Ok(result.text)
    }

    fn parameter_count(&self) -> usize {
        self.model.parameter_count
    }

    fn hidden_size(&self) -> usize {
        self.model.hidden_size()
    }
}

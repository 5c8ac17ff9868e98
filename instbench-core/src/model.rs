//! Model loading
//!
//! Loads a LLaMA-family model either from a local model directory or from
//! the HuggingFace Hub, together with its tokenizer and generation defaults.

use anyhow::{anyhow, bail, Context, Result};
use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::llama::{Config, Llama, LlamaConfig, LlamaEosToks};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tracing::{info, warn};

use crate::sampling::GenerationConfig;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const GENERATION_CONFIG_FILE: &str = "generation_config.json";
const SINGLE_WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

/// Configuration for model loading
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Local model directory, or a HuggingFace model ID (e.g., "meta-llama/Llama-3.2-1B")
    pub model: String,
    /// Hub revision/branch, ignored for local directories
    pub revision: String,
    /// Data type for model weights
    pub dtype: DType,
    /// Whether to use flash attention
    pub use_flash_attn: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "/storage/hiu/llm/Llama-3.2-1B-Instruct/".to_string(),
            revision: "main".to_string(),
            dtype: DType::F32,
            use_flash_attn: false,
        }
    }
}

impl ModelConfig {
    pub fn new(model: impl Into<String>, dtype: DType) -> Self {
        Self {
            model: model.into(),
            dtype,
            ..Default::default()
        }
    }

    /// Reject settings this build cannot run
    pub fn validate(&self) -> Result<()> {
        if self.use_flash_attn && !cfg!(feature = "flash-attn") {
            bail!("flash attention requested but instbench was built without the `flash-attn` feature");
        }
        Ok(())
    }
}

/// Resolved paths of everything needed to build a model
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
    pub generation_config: Option<PathBuf>,
}

impl ModelFiles {
    /// Locate model files inside a local directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let require = |name: &str| -> Result<PathBuf> {
            let path = dir.join(name);
            if !path.is_file() {
                bail!("{} not found in {}", name, dir.display());
            }
            Ok(path)
        };

        let index = dir.join(WEIGHTS_INDEX_FILE);
        let weights = if index.is_file() {
            weight_files_from_index(&index)?
                .into_iter()
                .map(|name| dir.join(name))
                .collect()
        } else {
            vec![require(SINGLE_WEIGHTS_FILE)?]
        };

        let generation_config = Some(dir.join(GENERATION_CONFIG_FILE)).filter(|p| p.is_file());

        Ok(Self {
            config: require(CONFIG_FILE)?,
            tokenizer: require(TOKENIZER_FILE)?,
            weights,
            generation_config,
        })
    }

    /// Download (or reuse cached) model files from the HuggingFace Hub
    pub fn from_hub(model_id: &str, revision: &str) -> Result<Self> {
        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let weights = match repo.get(WEIGHTS_INDEX_FILE) {
            Ok(index) => weight_files_from_index(&index)?
                .iter()
                .map(|name| repo.get(name))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            Err(_) => vec![repo.get(SINGLE_WEIGHTS_FILE)?],
        };

        Ok(Self {
            config: repo.get(CONFIG_FILE)?,
            tokenizer: repo.get(TOKENIZER_FILE)?,
            weights,
            generation_config: repo.get(GENERATION_CONFIG_FILE).ok(),
        })
    }

    pub fn resolve(config: &ModelConfig) -> Result<Self> {
        let dir = Path::new(&config.model);
        if dir.is_dir() {
            info!("Loading model from local directory {}", dir.display());
            Self::from_dir(dir)
        } else {
            info!("Fetching model {} (revision {}) from the Hub", config.model, config.revision);
            Self::from_hub(&config.model, &config.revision)
        }
    }
}

/// Shard file names listed in a safetensors index, deduplicated and sorted
pub fn weight_files_from_index(index: &Path) -> Result<Vec<String>> {
    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(index)?)
        .with_context(|| format!("parsing {}", index.display()))?;
    let weight_map = match json.get("weight_map") {
        Some(serde_json::Value::Object(map)) => map,
        _ => bail!("no weight map in {:?}", index),
    };

    let files: BTreeSet<String> = weight_map
        .values()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    Ok(files.into_iter().collect())
}

/// Count the tensors stored across safetensors files
pub fn count_parameter_tensors(weights: &[PathBuf]) -> Result<usize> {
    let tensors = unsafe { MmapedSafetensors::multi(weights)? };
    Ok(tensors.tensors().len())
}

/// Loaded model ready for inference
pub struct LoadedModel {
    pub model: Llama,
    pub tokenizer: Tokenizer,
    pub config: Config,
    pub device: Device,
    pub dtype: DType,
    pub eos_token_id: Option<LlamaEosToks>,
    pub parameter_count: usize,
    pub generation_config: Option<GenerationConfig>,
}

impl LoadedModel {
    pub fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    pub fn hidden_size(&self) -> usize {
        self.config.hidden_size
    }

    pub fn num_layers(&self) -> usize {
        self.config.num_hidden_layers
    }

    pub fn is_eos(&self, token: u32) -> bool {
        match &self.eos_token_id {
            Some(LlamaEosToks::Single(id)) => *id == token,
            Some(LlamaEosToks::Multiple(ids)) => ids.contains(&token),
            None => false,
        }
    }
}

/// Load a model described by `config` onto `device`
pub fn load_model(config: &ModelConfig, device: &Device) -> Result<LoadedModel> {
    config.validate()?;
    let files = ModelFiles::resolve(config)?;

    info!("Loading tokenizer...");
    let tokenizer = Tokenizer::from_file(&files.tokenizer)
        .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

    info!("Loading model config...");
    let llama_config: LlamaConfig = serde_json::from_slice(&std::fs::read(&files.config)?)
        .with_context(|| format!("parsing {}", files.config.display()))?;
    let model_config = llama_config.into_config(config.use_flash_attn);

    let eos_token_id = model_config.eos_token_id.clone().or_else(|| {
        tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("<|end_of_text|>"))
            .map(LlamaEosToks::Single)
    });
    if eos_token_id.is_none() {
        warn!("No EOS token found; generation always runs to the token limit");
    }

    let generation_config = match &files.generation_config {
        Some(path) => match GenerationConfig::from_file(path) {
            Ok(gen) => Some(gen),
            Err(e) => {
                warn!("Ignoring unreadable {}: {}", path.display(), e);
                None
            }
        },
        None => None,
    };

    info!("Loading {} safetensor file(s)", files.weights.len());
    let parameter_count = count_parameter_tensors(&files.weights)?;
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files.weights, config.dtype, device)? };
    let model = Llama::load(vb, &model_config).map_err(|e| anyhow!("Failed to load model: {}", e))?;

    info!("Model loaded successfully!");
    info!("  - Vocab size: {}", model_config.vocab_size);
    info!("  - Hidden size: {}", model_config.hidden_size);
    info!("  - Layers: {}", model_config.num_hidden_layers);
    info!("  - Heads: {}", model_config.num_attention_heads);
    info!("  - KV Heads: {}", model_config.num_key_value_heads);
    info!("  - Parameter tensors: {}", parameter_count);

    Ok(LoadedModel {
        model,
        tokenizer,
        config: model_config,
        device: device.clone(),
        dtype: config.dtype,
        eos_token_id,
        parameter_count,
        generation_config,
    })
}

/// Pick CUDA or Metal when compiled in and present, else CPU
pub fn select_device(force_cpu: bool) -> Result<Device> {
    if force_cpu {
        Ok(Device::Cpu)
    } else if candle_core::utils::cuda_is_available() {
        Ok(Device::new_cuda(0)?)
    } else if candle_core::utils::metal_is_available() {
        Ok(Device::new_metal(0)?)
    } else {
        Ok(Device::Cpu)
    }
}

/// Create a logits processor with sampling parameters
pub fn create_logits_processor(
    seed: u64,
    temperature: f64,
    top_p: Option<f64>,
    top_k: Option<usize>,
) -> LogitsProcessor {
    let sampling = if temperature <= 0. {
        Sampling::ArgMax
    } else {
        match (top_k, top_p) {
            (None, None) => Sampling::All { temperature },
            (Some(k), None) => Sampling::TopK { k, temperature },
            (None, Some(p)) => Sampling::TopP { p, temperature },
            (Some(k), Some(p)) => Sampling::TopKThenTopP { k, p, temperature },
        }
    };
    LogitsProcessor::from_sampling(seed, sampling)
}

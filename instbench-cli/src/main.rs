//! Instbench - time a causal LM over a file of instructions
//!
//! Writes `results.csv` and `model_metrics.csv` into a directory named after
//! the model path.

use std::path::PathBuf;

use anyhow::{Context, Result};
use candle_core::{DType, Device};
use clap::{Parser, ValueEnum};
use instbench_core::{
    load_instructions, run_instructions, select_device, write_report, BenchConfig, EngineConfig,
    InferenceEngine, MemoryProbe, ModelConfig, ModelMetrics, ProcessMemory, PromptTemplate,
    RunSummary, SamplingOverrides, DEFAULT_INSTRUCTIONS_FILE, DEFAULT_PROMPT_TEMPLATE,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WeightDType {
    F32,
    F16,
    Bf16,
}

impl From<WeightDType> for DType {
    fn from(value: WeightDType) -> Self {
        match value {
            WeightDType::F32 => DType::F32,
            WeightDType::F16 => DType::F16,
            WeightDType::Bf16 => DType::BF16,
        }
    }
}

/// Benchmark a causal language model over a list of instructions
#[derive(Parser)]
#[command(name = "instbench")]
#[command(version)]
struct Cli {
    /// Local model directory or HuggingFace model ID
    #[arg(long, env = "INSTBENCH_MODEL", default_value = "/storage/hiu/llm/Llama-3.2-1B-Instruct/")]
    model: String,

    /// Hub revision, ignored for local directories
    #[arg(long, default_value = "main")]
    revision: String,

    /// Newline-delimited instruction file
    #[arg(short, long, default_value = DEFAULT_INSTRUCTIONS_FILE)]
    instructions: PathBuf,

    /// Directory that receives the per-model output directory
    #[arg(short, long, default_value = ".")]
    output_root: PathBuf,

    /// Prompt template; `{}` is replaced by the instruction
    #[arg(long, default_value = DEFAULT_PROMPT_TEMPLATE)]
    template: String,

    /// Maximum number of new tokens per generation
    #[arg(long, default_value = "100")]
    max_new_tokens: usize,

    /// Weight dtype (default: bf16 on GPU, f32 on CPU)
    #[arg(long, value_enum)]
    dtype: Option<WeightDType>,

    /// Sampling temperature, 0 for greedy (default: model generation config)
    #[arg(long)]
    temperature: Option<f64>,

    /// Nucleus sampling threshold
    #[arg(long)]
    top_p: Option<f64>,

    /// Top-k sampling cutoff
    #[arg(long)]
    top_k: Option<usize>,

    /// Sampling seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Repeat penalty (1.0 = no penalty)
    #[arg(long, default_value = "1.0")]
    repeat_penalty: f32,

    /// Run on CPU even when a GPU is available
    #[arg(long)]
    cpu: bool,

    /// Use flash attention (requires the flash-attn feature)
    #[arg(long)]
    flash_attn: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn bench_config(&self) -> BenchConfig {
        BenchConfig {
            instructions_path: self.instructions.clone(),
            output_root: self.output_root.clone(),
            prompt_template: PromptTemplate::new(&self.template),
            ..BenchConfig::new(&self.model)
        }
    }

    fn engine_config(&self, device: &Device) -> EngineConfig {
        let dtype = match self.dtype {
            Some(d) => d.into(),
            None if device.is_cpu() => DType::F32,
            None => DType::BF16,
        };

        let model_config = ModelConfig {
            model: self.model.clone(),
            revision: self.revision.clone(),
            dtype,
            use_flash_attn: self.flash_attn,
        };

        EngineConfig {
            model_config,
            sampling: SamplingOverrides {
                max_new_tokens: Some(self.max_new_tokens),
                temperature: self.temperature,
                top_p: self.top_p,
                top_k: self.top_k,
                seed: Some(self.seed),
            },
            repeat_penalty: self.repeat_penalty,
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let bench = cli.bench_config();
    let instructions = load_instructions(&bench.instructions_path)
        .with_context(|| format!("reading instructions from {}", bench.instructions_path.display()))?;
    info!("Loaded {} instruction(s)", instructions.len());

    let device = select_device(cli.cpu)?;
    let engine_config = cli.engine_config(&device);
    engine_config.model_config.validate()?;
    let mut engine = InferenceEngine::new(engine_config, device)?;

    let stats = engine.stats();
    info!("Engine initialized successfully!");
    info!("  Model: {}", stats.model);
    info!("  Hidden size: {}", stats.hidden_size);
    info!("  Layers: {}", stats.num_layers);
    info!("  Parameter tensors: {}", stats.parameter_tensors);
    info!("  Device: {}", stats.device);
    info!("  Dtype: {}", stats.dtype);

    let mut probe = ProcessMemory::new()?;
    let baseline = probe.resident_mb()?;
    let model_metrics = ModelMetrics::capture(&engine, baseline);
    info!("Resident memory after load: {:.2} MB", baseline);

    let results = run_instructions(&mut engine, &mut probe, &bench.prompt_template, &instructions)?;

    let paths = write_report(&bench.output_root, &bench.model, &results, &model_metrics)?;

    if let Some(summary) = RunSummary::from_records(&results) {
        info!("{}", summary);
    }
    info!("Results in {}", paths.dir.display());
    Ok(())
}

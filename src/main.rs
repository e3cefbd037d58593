use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use speculative_sampling::{
    load_generation_config, AutoregressiveGenerator, BigramOracle, GenerationConfig,
    SpeculativeEngine, TextCodec,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Speculative,
    Autoregressive,
    Both,
}

#[derive(Parser, Debug)]
#[command(name = "speculative-sampling")]
#[command(about = "Speculative sampling against synthetic draft/target oracles")]
struct Args {
    /// Input prompt (requires --tokenizer)
    #[arg(short, long, default_value = "Alan Turing theorized that computers would one day become ")]
    input: String,

    /// Prompt as comma-separated token ids (used when no tokenizer is given)
    #[arg(long, default_value = "1,2,3,4")]
    prompt_ids: String,

    /// Path to a tokenizer.json used to encode the input and decode outputs
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// JSON generation config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Which generator(s) to run
    #[arg(long, value_enum, default_value = "both")]
    mode: Mode,

    /// Number of new tokens to generate
    #[arg(long)]
    max_new_tokens: Option<usize>,

    /// Tokens drafted per round
    #[arg(long)]
    gamma: Option<usize>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Top-k (0 = disabled)
    #[arg(long)]
    top_k: Option<usize>,

    /// Top-p (0 = disabled)
    #[arg(long)]
    top_p: Option<f32>,

    /// Seed for the request random generator
    #[arg(long)]
    seed: Option<u64>,

    /// Vocabulary size of the synthetic oracles (defaults to the tokenizer's)
    #[arg(long)]
    vocab_size: Option<usize>,

    /// Logit range of the synthetic target oracle
    #[arg(long, default_value = "4.0")]
    logit_scale: f32,

    /// Noise separating the draft oracle from the target oracle
    #[arg(long, default_value = "0.5")]
    draft_noise: f32,

    /// Seed of the synthetic oracle weights
    #[arg(long, default_value = "0")]
    oracle_seed: u64,
}

impl Args {
    fn generation_config(&self) -> anyhow::Result<GenerationConfig> {
        let mut config = match &self.config {
            Some(path) => load_generation_config(path)?,
            None => {
                let mut config = GenerationConfig::default();
                config.sampling.top_k = 10;
                config
            }
        };

        if let Some(v) = self.max_new_tokens {
            config.max_new_tokens = v;
        }
        if let Some(v) = self.gamma {
            config.speculative.gamma = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.temperature {
            config.sampling.temperature = v;
        }
        if let Some(v) = self.top_k {
            config.sampling.top_k = v;
        }
        if let Some(v) = self.top_p {
            config.sampling.top_p = v;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_ids(ids: &str) -> anyhow::Result<Vec<u32>> {
    ids.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().with_context(|| format!("invalid token id `{s}`")))
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.generation_config()?;

    let codec = args.tokenizer.as_ref().map(TextCodec::from_file).transpose()?;
    let prefix = match &codec {
        Some(codec) => codec.encode(&args.input)?,
        None => parse_ids(&args.prompt_ids)?,
    };
    if prefix.is_empty() {
        bail!("prompt encodes to zero tokens");
    }

    let vocab_size = match (args.vocab_size, &codec) {
        (Some(v), _) => v,
        (None, Some(codec)) => codec.vocab_size(),
        (None, None) => 256,
    };

    info!(
        "speculative-sampling v{}: vocab {}, gamma {}, {} new tokens",
        env!("CARGO_PKG_VERSION"),
        vocab_size,
        config.speculative.gamma,
        config.max_new_tokens
    );

    let target = BigramOracle::random(
        vocab_size,
        args.logit_scale,
        config.sampling.forbidden_token,
        args.oracle_seed,
    )?;
    let draft = target.perturbed(args.draft_noise, args.oracle_seed.wrapping_add(1));

    let render = |ids: &[u32]| -> anyhow::Result<String> {
        Ok(match &codec {
            Some(codec) => codec.decode(ids)?,
            None => format!("{ids:?}"),
        })
    };

    if matches!(args.mode, Mode::Speculative | Mode::Both) {
        let engine = SpeculativeEngine::new(
            &draft,
            &target,
            config.speculative.clone(),
            &config.sampling,
        )?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let output = engine.generate(&prefix, config.max_new_tokens, &mut rng)?;

        println!("speculative_sampling: {}", render(&output.sequence.all_token_ids())?);
        println!(
            "  rounds: {}, acceptance: {:.1}%, target calls: {}, draft calls: {}",
            output.stats.rounds,
            output.stats.acceptance_rate() * 100.0,
            output.stats.target_calls,
            output.stats.draft_calls
        );
    }

    if matches!(args.mode, Mode::Autoregressive | Mode::Both) {
        let generator = AutoregressiveGenerator::new(&target, &config.sampling)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let seq = generator.generate(&prefix, config.max_new_tokens, &mut rng)?;

        println!("autoregressive_sampling: {}", render(&seq.all_token_ids())?);
    }

    Ok(())
}

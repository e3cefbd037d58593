//! speculative-sampling: draft-then-verify token generation.
//!
//! A cheap draft oracle proposes several tokens, an expensive target oracle
//! checks them all in one forward pass, and rejection sampling decides which
//! to keep. The output follows the target oracle's distribution exactly
//! while calling it far less often than token-by-token generation.
//!
//! - `engine`: token sampler and the autoregressive baseline
//! - `speculative`: draft proposer, verifier and the decoding loop
//! - `model`: the oracle interface and synthetic oracles

pub mod config;
pub mod error;

pub mod core;
pub mod engine;
pub mod model;
pub mod speculative;
pub mod tokenizer;

pub use config::{load_generation_config, GenerationConfig, SamplingConfig};
pub use crate::core::sequence::{FinishReason, Sequence};
pub use engine::{AutoregressiveGenerator, Sampler};
pub use error::{Error, Result};
pub use model::{position_logits, BigramOracle, DistributionOracle, ScriptedOracle, UniformOracle};
pub use speculative::{
    RoundReport, SpeculativeConfig, SpeculativeEngine, SpeculativeOutput, SpeculativeStats,
    Verification,
};
pub use tokenizer::TextCodec;

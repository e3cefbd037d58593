//! Error types for speculative sampling.

use thiserror::Error;

/// Result type alias for speculative sampling operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for speculative sampling.
#[derive(Error, Debug)]
pub enum Error {
    /// The sampler drew the forbidden token id.
    ///
    /// This signals a degenerate distribution (for example an extreme
    /// temperature) and aborts the in-flight generation.
    #[error("sampled forbidden token id {token}")]
    InvalidToken { token: u32 },

    /// A generation was requested with an empty prefix.
    #[error("prefix must contain at least one token")]
    EmptyPrefix,

    /// Number of speculative tokens per round must be at least 1.
    #[error("gamma must be >= 1, got {0}")]
    InvalidGamma(usize),

    /// Temperature must be finite and strictly positive.
    #[error("temperature must be > 0, got {0}")]
    InvalidTemperature(f32),

    /// Top-p must lie in [0, 1].
    #[error("top_p must be in [0, 1], got {0}")]
    InvalidTopP(f32),

    /// Only a batch of exactly one sequence is supported.
    #[error("batch size must be 1, got {0}")]
    BatchSize(usize),

    /// An oracle or caller supplied a tensor with unexpected dimensions.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// A token id does not fit the oracle's vocabulary.
    #[error("token {token} out of range for vocabulary of {vocab_size}")]
    TokenOutOfRange { token: u32, vocab_size: usize },

    /// Sampling weights could not form a probability distribution.
    #[error("degenerate distribution: {0}")]
    DegenerateDistribution(String),

    /// Tokenization error.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

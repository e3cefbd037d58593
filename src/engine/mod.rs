//! Token generation.
//!
//! This module contains:
//! - Sampler for token selection
//! - AutoregressiveGenerator, the one-token-per-call baseline

pub mod autoregressive;
pub mod sampler;

pub use autoregressive::AutoregressiveGenerator;
pub use sampler::{apply_top_k, apply_top_p, softmax, Sampler};

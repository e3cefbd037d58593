//! Core request state.
//!
//! - Sequence for tracking the prompt and generated tokens of one request

pub mod sequence;

pub use sequence::{FinishReason, Sequence};

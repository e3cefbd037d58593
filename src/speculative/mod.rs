//! Speculative decoding.
//!
//! This module implements draft-verify speculative sampling.
//!
//! ## How it works
//!
//! 1. **Draft Phase**: A cheap draft oracle proposes γ tokens, one oracle
//!    call per token.
//!
//! 2. **Verify Phase**: The target oracle scores the prefix plus all γ
//!    drafted tokens in a single forward pass.
//!
//! 3. **Rejection Sampling**: Each drafted token is accepted with probability
//!    `min(1, p_target / p_draft)`. The first rejection is replaced by a draw
//!    from `norm(max(p_target - p_draft, 0))`; a fully accepted round earns a
//!    bonus token from the target.
//!
//! ## Example
//!
//! ```text
//! Draft (γ=4):     [prompt] -> t1 -> t2 -> t3 -> t4
//! Target verify:   [prompt, t1, t2, t3, t4] -> logits for every position
//! Rejection:       Accept t1, t2, reject t3, resample -> final: t1, t2, t3'
//! ```

pub mod config;
pub mod engine;
pub mod proposer;
pub mod stats;
pub mod verifier;

pub use config::SpeculativeConfig;
pub use engine::{RoundReport, SpeculativeEngine, SpeculativeOutput};
pub use proposer::{DraftProposal, DraftProposer};
pub use stats::SpeculativeStats;
pub use verifier::{
    acceptance_ratio, accepted_prefix_len, residual_distribution, Verification, Verifier,
};

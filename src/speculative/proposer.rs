//! Draft proposer.
//!
//! Extends a sequence by γ tokens with the draft oracle, re-running the
//! oracle over the growing sequence for every drafted token.

use candle_core::{IndexOp, Tensor};
use rand::Rng;
use tracing::debug;

use crate::engine::Sampler;
use crate::error::{Error, Result};
use crate::model::{position_logits, DistributionOracle};

/// Tokens proposed in one round, with the draft logits needed to verify them.
#[derive(Debug, Clone)]
pub struct DraftProposal {
    /// Prefix followed by the γ drafted tokens.
    pub token_ids: Vec<u32>,
    /// Length of the prefix the round started from.
    pub prefix_len: usize,
    /// Logits of the last draft call, `[prefix_len + γ - 1, vocab_size]`.
    pub draft_logits: Tensor,
}

impl DraftProposal {
    /// Number of drafted tokens (γ).
    pub fn gamma(&self) -> usize {
        self.token_ids.len() - self.prefix_len
    }

    /// The drafted tokens only.
    pub fn drafted(&self) -> &[u32] {
        &self.token_ids[self.prefix_len..]
    }
}

/// Draft token generator.
#[derive(Debug, Clone)]
pub struct DraftProposer {
    gamma: usize,
    sampler: Sampler,
}

impl DraftProposer {
    /// Create a proposer drafting `gamma` tokens per call.
    pub fn new(gamma: usize, sampler: Sampler) -> Result<Self> {
        if gamma == 0 {
            return Err(Error::InvalidGamma(gamma));
        }
        Ok(Self { gamma, sampler })
    }

    /// Draft γ tokens after `prefix`.
    ///
    /// The returned logits come from the final oracle call, which covers
    /// every position the verifier compares against.
    pub fn propose<O, R>(&self, prefix: &[u32], draft: &O, rng: &mut R) -> Result<DraftProposal>
    where
        O: DistributionOracle + ?Sized,
        R: Rng + ?Sized,
    {
        if prefix.is_empty() {
            return Err(Error::EmptyPrefix);
        }

        let prefix_len = prefix.len();
        let mut token_ids = Vec::with_capacity(prefix_len + self.gamma);
        token_ids.extend_from_slice(prefix);

        let mut draft_logits = None;
        for _ in 0..self.gamma {
            let logits = position_logits(draft, &token_ids)?;
            let token = self.sampler.sample(&logits.i(token_ids.len() - 1)?, rng)?;

            debug!(position = token_ids.len(), token, "drafted");
            token_ids.push(token);
            draft_logits = Some(logits);
        }

        let draft_logits = draft_logits.ok_or(Error::InvalidGamma(self.gamma))?;

        Ok(DraftProposal {
            token_ids,
            prefix_len,
            draft_logits,
        })
    }

    /// Number of tokens drafted per round.
    pub fn gamma(&self) -> usize {
        self.gamma
    }

    /// Get the sampler.
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }
}

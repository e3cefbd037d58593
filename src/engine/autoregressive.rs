//! Autoregressive baseline generator.
//!
//! One oracle call per token: take the logits at the last position, sample,
//! append, repeat. Speculative decoding must reproduce the output
//! distribution of this loop run against the target oracle.

use std::time::Instant;

use candle_core::IndexOp;
use rand::Rng;
use tracing::{debug, info};

use super::sampler::Sampler;
use crate::config::SamplingConfig;
use crate::core::sequence::{FinishReason, Sequence};
use crate::error::Result;
use crate::model::{position_logits, DistributionOracle};

/// Token-by-token generator over a single oracle.
#[derive(Debug, Clone)]
pub struct AutoregressiveGenerator<O> {
    oracle: O,
    sampler: Sampler,
}

impl<O: DistributionOracle> AutoregressiveGenerator<O> {
    /// Create a generator for `oracle`.
    pub fn new(oracle: O, sampling: &SamplingConfig) -> Result<Self> {
        Ok(Self {
            oracle,
            sampler: Sampler::new(sampling)?,
        })
    }

    /// Generate exactly `max_new_tokens` tokens after `prefix`.
    ///
    /// # Errors
    ///
    /// Fails on an empty prefix, an oracle error or a forbidden token draw.
    pub fn generate<R>(&self, prefix: &[u32], max_new_tokens: usize, rng: &mut R) -> Result<Sequence>
    where
        R: Rng + ?Sized,
    {
        let mut seq = Sequence::new(prefix.to_vec())?;
        let mut token_ids = prefix.to_vec();
        let start = Instant::now();

        while seq.output_len() < max_new_tokens {
            let logits = position_logits(&self.oracle, &token_ids)?;
            let last = logits.i(token_ids.len() - 1)?;
            let token = self.sampler.sample(&last, rng)?;

            debug!(position = token_ids.len(), token, "autoregressive step");
            token_ids.push(token);
            seq.append_token(token);
        }

        seq.set_finished(FinishReason::MaxTokens);
        info!(
            "Autoregressive: {} tokens in {:.2}ms",
            seq.output_len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(seq)
    }

    /// Get the sampler.
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Get reference to the oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

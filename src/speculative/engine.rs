//! Speculative decoding engine.
//!
//! Orchestrates the draft proposer and the verifier until the requested
//! number of tokens has been generated.

use std::ops::ControlFlow;
use std::time::Instant;

use rand::Rng;
use tracing::{debug, info};

use super::config::SpeculativeConfig;
use super::proposer::DraftProposer;
use super::stats::SpeculativeStats;
use super::verifier::{Verification, Verifier};
use crate::config::SamplingConfig;
use crate::core::sequence::{FinishReason, Sequence};
use crate::engine::Sampler;
use crate::error::{Error, Result};
use crate::model::DistributionOracle;

/// Progress report emitted after every round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    /// Zero-based round index.
    pub round: usize,
    /// Acceptance boundary n of the round.
    pub boundary: usize,
    /// Drafted tokens accepted this round.
    pub num_accepted: usize,
    /// Whether the final token was resampled after a rejection.
    pub resampled: bool,
    /// Sequence length before the round.
    pub previous_len: usize,
    /// Sequence length after the round (before the final trim).
    pub total_len: usize,
}

impl RoundReport {
    /// Tokens added by this round (between 1 and γ + 1).
    pub fn progress(&self) -> usize {
        self.total_len - self.previous_len
    }
}

/// Output of a speculative generation.
#[derive(Debug, Clone)]
pub struct SpeculativeOutput {
    /// Prompt plus generated tokens.
    pub sequence: Sequence,
    /// Round and acceptance counters.
    pub stats: SpeculativeStats,
}

/// Speculative decoding engine.
///
/// Coordinates between a cheap draft oracle and an expensive target oracle
/// to accelerate autoregressive generation without changing its output
/// distribution.
///
/// ## Workflow
///
/// 1. **Draft**: Generate γ tokens with the draft oracle
/// 2. **Verify**: Run the target oracle on all of them in one forward pass
/// 3. **Accept/Reject**: Rejection sampling keeps a prefix of the draft and
///    appends one resampled or bonus token
///
/// ## Example
///
/// ```text
/// Input:  [The, quick, brown]
/// Draft:  [fox, jumps, over, the]     <- γ = 4 speculative tokens
/// Target: Verify all positions        <- 1 forward pass
/// Result: [fox, jumps, over']         <- 2 accepted + 1 resampled
/// ```
pub struct SpeculativeEngine<D, T> {
    /// Cheap draft oracle.
    draft: D,
    /// Expensive target oracle (ground truth).
    target: T,
    /// Configuration.
    config: SpeculativeConfig,
    /// Draft token generator.
    proposer: DraftProposer,
    /// Rejection sampler.
    verifier: Verifier,
}

impl<D, T> SpeculativeEngine<D, T>
where
    D: DistributionOracle,
    T: DistributionOracle,
{
    /// Create a new speculative engine.
    ///
    /// # Arguments
    ///
    /// * `draft` - Cheap oracle proposing tokens
    /// * `target` - Oracle whose distribution the output must follow
    /// * `config` - Speculative decoding configuration
    /// * `sampling` - Sampling parameters shared by every draw
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or if the two vocabularies differ.
    pub fn new(draft: D, target: T, config: SpeculativeConfig, sampling: &SamplingConfig) -> Result<Self> {
        config.validate()?;
        if draft.vocab_size() != target.vocab_size() {
            return Err(Error::Config(format!(
                "draft vocabulary ({}) differs from target vocabulary ({})",
                draft.vocab_size(),
                target.vocab_size()
            )));
        }

        let sampler = Sampler::new(sampling)?;

        Ok(Self {
            draft,
            target,
            proposer: DraftProposer::new(config.gamma, sampler.clone())?,
            verifier: Verifier::new(sampler),
            config,
        })
    }

    /// Perform one speculative round on `token_ids`.
    ///
    /// Returns the verified sequence: `token_ids` followed by 1 to γ + 1
    /// new tokens.
    pub fn speculative_step<R>(&self, token_ids: &[u32], rng: &mut R) -> Result<Verification>
    where
        R: Rng + ?Sized,
    {
        let proposal = self.proposer.propose(token_ids, &self.draft, rng)?;
        let gamma = proposal.gamma();

        self.verifier.verify(
            proposal.token_ids,
            proposal.prefix_len,
            gamma,
            &proposal.draft_logits,
            &self.target,
            rng,
        )
    }

    /// Generate `max_new_tokens` tokens after `prefix`.
    pub fn generate<R>(&self, prefix: &[u32], max_new_tokens: usize, rng: &mut R) -> Result<SpeculativeOutput>
    where
        R: Rng + ?Sized,
    {
        self.generate_with_observer(prefix, max_new_tokens, rng, |_| ControlFlow::Continue(()))
    }

    /// Generate `max_new_tokens` tokens, reporting every round to `observer`.
    ///
    /// Returning [`ControlFlow::Break`] from the observer stops generation
    /// after the current round; the output then finishes with
    /// [`FinishReason::Aborted`]. The final round may overshoot the
    /// requested length, and the extra tokens are dropped.
    pub fn generate_with_observer<R, F>(
        &self,
        prefix: &[u32],
        max_new_tokens: usize,
        rng: &mut R,
        mut observer: F,
    ) -> Result<SpeculativeOutput>
    where
        R: Rng + ?Sized,
        F: FnMut(&RoundReport) -> ControlFlow<()>,
    {
        let mut seq = Sequence::new(prefix.to_vec())?;
        let mut token_ids = prefix.to_vec();
        let target_len = prefix.len() + max_new_tokens;
        let mut stats = SpeculativeStats::default();
        let start = Instant::now();

        let mut finish_reason = FinishReason::MaxTokens;
        while token_ids.len() < target_len {
            let previous_len = token_ids.len();
            let verification = self.speculative_step(&token_ids, rng)?;
            stats.record_round(self.config.gamma, &verification);

            let report = RoundReport {
                round: stats.rounds - 1,
                boundary: verification.boundary,
                num_accepted: verification.num_accepted,
                resampled: verification.resampled,
                previous_len,
                total_len: verification.token_ids.len(),
            };
            debug!(
                round = report.round,
                accepted = report.num_accepted,
                progress = report.progress(),
                "speculative round"
            );

            seq.extend_tokens(&verification.token_ids[previous_len..]);
            token_ids = verification.token_ids;

            if observer(&report).is_break() && token_ids.len() < target_len {
                finish_reason = FinishReason::Aborted;
                break;
            }
        }

        seq.truncate_output(max_new_tokens);
        seq.set_finished(finish_reason);

        info!(
            "Speculative decode: {} tokens in {} rounds ({:.2}ms)",
            seq.output_len(),
            stats.rounds,
            start.elapsed().as_secs_f64() * 1000.0
        );
        info!(
            "Draft: {}/{} accepted ({:.1}%), target passes: {} (vs {} without speculation)",
            stats.accepted_tokens,
            stats.drafted_tokens,
            stats.acceptance_rate() * 100.0,
            stats.target_calls,
            seq.output_len()
        );

        Ok(SpeculativeOutput {
            sequence: seq,
            stats,
        })
    }

    /// Get the speculative configuration.
    pub fn config(&self) -> &SpeculativeConfig {
        &self.config
    }

    /// Get reference to the draft oracle.
    pub fn draft(&self) -> &D {
        &self.draft
    }

    /// Get reference to the target oracle.
    pub fn target(&self) -> &T {
        &self.target
    }
}

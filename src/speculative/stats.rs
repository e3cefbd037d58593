//! Counters collected over one speculative generation.

use super::verifier::Verification;

/// Per-request speculative decoding statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeculativeStats {
    /// Number of draft/verify rounds.
    pub rounds: usize,
    /// Tokens proposed by the draft oracle.
    pub drafted_tokens: usize,
    /// Drafted tokens kept by the verifier.
    pub accepted_tokens: usize,
    /// Tokens drawn from the residual distribution after a rejection.
    pub resampled_tokens: usize,
    /// Tokens drawn from the target after a fully accepted round.
    pub bonus_tokens: usize,
    /// Draft oracle forward passes.
    pub draft_calls: usize,
    /// Target oracle forward passes.
    pub target_calls: usize,
}

impl SpeculativeStats {
    /// Record one finished round with lookahead `gamma`.
    pub fn record_round(&mut self, gamma: usize, verification: &Verification) {
        self.rounds += 1;
        self.drafted_tokens += gamma;
        self.accepted_tokens += verification.num_accepted;
        if verification.resampled {
            self.resampled_tokens += 1;
        } else {
            self.bonus_tokens += 1;
        }
        self.draft_calls += gamma;
        self.target_calls += 1;
    }

    /// Fraction of drafted tokens accepted (0.0 before any round).
    pub fn acceptance_rate(&self) -> f64 {
        if self.drafted_tokens == 0 {
            return 0.0;
        }
        self.accepted_tokens as f64 / self.drafted_tokens as f64
    }

    /// Average tokens emitted per round (accepted + resampled/bonus).
    pub fn tokens_per_round(&self) -> f64 {
        if self.rounds == 0 {
            return 0.0;
        }
        (self.accepted_tokens + self.resampled_tokens + self.bonus_tokens) as f64
            / self.rounds as f64
    }
}

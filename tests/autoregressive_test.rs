//! Integration tests for AutoregressiveGenerator and DraftProposer.

use std::cell::Cell;

use candle_core::Tensor;
use rand::rngs::StdRng;
use rand::SeedableRng;
use speculative_sampling::config::SamplingConfig;
use speculative_sampling::speculative::DraftProposer;
use speculative_sampling::{
    AutoregressiveGenerator, BigramOracle, DistributionOracle, Error, FinishReason, Result,
    Sampler,
};

/// Wraps an oracle and counts forward passes.
struct CountingOracle<O> {
    inner: O,
    calls: Cell<usize>,
}

impl<O> CountingOracle<O> {
    fn new(inner: O) -> Self {
        Self {
            inner,
            calls: Cell::new(0),
        }
    }
}

impl<O: DistributionOracle> DistributionOracle for CountingOracle<O> {
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor> {
        self.calls.set(self.calls.get() + 1);
        self.inner.forward(token_ids)
    }

    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }
}

fn test_oracle() -> BigramOracle {
    BigramOracle::random(16, 2.0, Some(0), 3).unwrap()
}

#[test]
fn test_generates_exact_length() {
    let oracle = CountingOracle::new(test_oracle());
    let generator = AutoregressiveGenerator::new(&oracle, &SamplingConfig::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    let seq = generator.generate(&[1, 2, 3], 12, &mut rng).unwrap();

    assert_eq!(seq.prompt_token_ids(), &[1, 2, 3]);
    assert_eq!(seq.output_len(), 12);
    assert_eq!(seq.finish_reason(), Some(FinishReason::MaxTokens));
    assert_eq!(oracle.calls.get(), 12);
    assert!(seq.output_token_ids().iter().all(|&t| t != 0 && t < 16));
}

#[test]
fn test_zero_new_tokens() {
    let oracle = CountingOracle::new(test_oracle());
    let generator = AutoregressiveGenerator::new(&oracle, &SamplingConfig::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    let seq = generator.generate(&[4], 0, &mut rng).unwrap();
    assert_eq!(seq.all_token_ids(), vec![4]);
    assert_eq!(oracle.calls.get(), 0);
}

#[test]
fn test_reproducible_with_seed() {
    let generator = AutoregressiveGenerator::new(test_oracle(), &SamplingConfig::default()).unwrap();

    let a = generator.generate(&[1], 20, &mut StdRng::seed_from_u64(5)).unwrap();
    let b = generator.generate(&[1], 20, &mut StdRng::seed_from_u64(5)).unwrap();
    let c = generator.generate(&[1], 20, &mut StdRng::seed_from_u64(6)).unwrap();

    assert_eq!(a, b);
    assert_ne!(a.output_token_ids(), c.output_token_ids());
}

#[test]
fn test_top_k_one_follows_argmax() {
    let oracle = test_oracle();
    let generator = AutoregressiveGenerator::new(&oracle, &SamplingConfig::default().top_k(1)).unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    let seq = generator.generate(&[2], 8, &mut rng).unwrap();

    let mut previous = 2;
    for &token in seq.output_token_ids() {
        let row = oracle.row(previous).unwrap();
        let argmax = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i as u32)
            .unwrap();
        assert_eq!(token, argmax);
        previous = token;
    }
}

#[test]
fn test_empty_prefix() {
    let generator = AutoregressiveGenerator::new(test_oracle(), &SamplingConfig::default()).unwrap();
    let result = generator.generate(&[], 3, &mut StdRng::seed_from_u64(0));
    assert!(matches!(result, Err(Error::EmptyPrefix)));
}

#[test]
fn test_out_of_range_prefix_token() {
    let generator = AutoregressiveGenerator::new(test_oracle(), &SamplingConfig::default()).unwrap();
    let result = generator.generate(&[99], 3, &mut StdRng::seed_from_u64(0));
    assert!(matches!(result, Err(Error::TokenOutOfRange { token: 99, .. })));
}

#[test]
fn test_proposer_drafts_gamma_tokens() {
    let oracle = CountingOracle::new(test_oracle());
    let sampler = Sampler::new(&SamplingConfig::default()).unwrap();
    let proposer = DraftProposer::new(3, sampler).unwrap();
    let mut rng = StdRng::seed_from_u64(1);

    let proposal = proposer.propose(&[1, 2], &oracle, &mut rng).unwrap();

    assert_eq!(oracle.calls.get(), 3);
    assert_eq!(proposal.prefix_len, 2);
    assert_eq!(proposal.gamma(), 3);
    assert_eq!(&proposal.token_ids[..2], &[1, 2]);
    assert_eq!(proposal.drafted().len(), 3);
    assert_eq!(proposal.draft_logits.dims(), &[4, 16]);
}

#[test]
fn test_proposer_matches_autoregressive_draws() {
    let oracle = test_oracle();
    let sampling = SamplingConfig::default();
    let proposer = DraftProposer::new(5, Sampler::new(&sampling).unwrap()).unwrap();
    let generator = AutoregressiveGenerator::new(&oracle, &sampling).unwrap();

    let proposal = proposer
        .propose(&[3], &oracle, &mut StdRng::seed_from_u64(9))
        .unwrap();
    let seq = generator.generate(&[3], 5, &mut StdRng::seed_from_u64(9)).unwrap();

    assert_eq!(proposal.token_ids, seq.all_token_ids());
}

#[test]
fn test_proposer_rejects_bad_input() {
    let sampler = Sampler::new(&SamplingConfig::default()).unwrap();
    assert!(matches!(
        DraftProposer::new(0, sampler.clone()),
        Err(Error::InvalidGamma(0))
    ));

    let proposer = DraftProposer::new(2, sampler).unwrap();
    let result = proposer.propose(&[], &test_oracle(), &mut StdRng::seed_from_u64(0));
    assert!(matches!(result, Err(Error::EmptyPrefix)));
}

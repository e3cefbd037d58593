//! Token sampling strategies.
//!
//! This module turns one logit vector into one token id:
//!
//! - **Temperature**: Controls randomness (lower = more deterministic)
//! - **Top-k**: Limits choices to the k highest-scoring tokens
//! - **Top-p (nucleus)**: Limits choices to the smallest set covering p probability mass
//!
//! ## Sampling Pipeline
//!
//! ```text
//! Logits [vocab_size]
//!     │
//!     ▼ Temperature scaling
//! Logits / temperature
//!     │
//!     ▼ Top-k filtering (optional)
//! Below k-th score -> -inf
//!     │
//!     ▼ Top-p filtering (optional)
//! Outside nucleus -> -inf
//!     │
//!     ▼ Softmax
//! Probabilities (filtered entries exactly 0)
//!     │
//!     ▼ Weighted draw
//! Selected token
//! ```
//!
//! The random generator is not owned by the sampler. Callers pass the
//! request-scoped generator in, so one seed reproduces a whole request.

use candle_core::{DType, Device, Tensor, D};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::config::SamplingConfig;
use crate::error::{Error, Result};

/// Token sampler with configurable sampling strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    /// Temperature for scaling logits.
    temperature: f32,
    /// Top-k value (0 = disabled).
    top_k: usize,
    /// Top-p value (0.0 = disabled).
    top_p: f32,
    /// Token id that must never be emitted.
    forbidden_token: Option<u32>,
}

impl Sampler {
    /// Creates a new sampler with the given configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: &SamplingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            forbidden_token: config.forbidden_token,
        })
    }

    /// Sample a token from 1D logits `[vocab_size]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] if the forbidden token is drawn and
    /// [`Error::DegenerateDistribution`] if the filtered weights are not a
    /// valid distribution.
    pub fn sample<R>(&self, logits: &Tensor, rng: &mut R) -> Result<u32>
    where
        R: Rng + ?Sized,
    {
        let logits: Vec<f32> = logits.to_dtype(DType::F32)?.to_vec1()?;
        self.sample_logits(&logits, rng)
    }

    /// Sample a token from a logit slice.
    pub fn sample_logits<R>(&self, logits: &[f32], rng: &mut R) -> Result<u32>
    where
        R: Rng + ?Sized,
    {
        let probs = self.probabilities(logits)?;

        let dist = WeightedIndex::new(&probs)
            .map_err(|e| Error::DegenerateDistribution(e.to_string()))?;
        let token = dist.sample(rng) as u32;

        if self.forbidden_token == Some(token) {
            return Err(Error::InvalidToken { token });
        }

        Ok(token)
    }

    /// The distribution [`Sampler::sample_logits`] draws from.
    ///
    /// Entries removed by top-k or top-p are exactly zero.
    pub fn probabilities(&self, logits: &[f32]) -> Result<Vec<f32>> {
        if logits.is_empty() {
            return Err(Error::DegenerateDistribution("empty logits".to_string()));
        }
        softmax(&self.filter(logits)?)
    }

    /// Apply temperature, top-k and top-p to raw logits.
    pub fn filter(&self, logits: &[f32]) -> Result<Vec<f32>> {
        let mut logits: Vec<f32> = logits.iter().map(|&l| l / self.temperature).collect();

        if self.top_k > 0 {
            apply_top_k(&mut logits, self.top_k);
        }
        if self.top_p > 0.0 {
            apply_top_p(&mut logits, self.top_p)?;
        }

        Ok(logits)
    }

    /// Get the temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Get top-k.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Get top-p.
    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    /// Get the forbidden token id.
    pub fn forbidden_token(&self) -> Option<u32> {
        self.forbidden_token
    }
}

/// Top-k filtering: every logit strictly below the k-th highest is set to -inf.
///
/// Ties with the k-th value survive, so more than k entries may remain.
pub fn apply_top_k(logits: &mut [f32], k: usize) {
    if k == 0 || k >= logits.len() {
        return;
    }

    let mut sorted = logits.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let threshold = sorted[k - 1];

    for l in logits.iter_mut() {
        if *l < threshold {
            *l = f32::NEG_INFINITY;
        }
    }
}

/// Top-p (nucleus) filtering: keep the smallest prefix, in descending
/// probability order, whose cumulative probability exceeds `p`.
///
/// The most likely entry is always kept. A cumulative mass exactly equal
/// to `p` does not exceed it, so the next entry survives.
pub fn apply_top_p(logits: &mut [f32], p: f32) -> Result<()> {
    if p <= 0.0 || logits.is_empty() {
        return Ok(());
    }
    let probs = softmax(logits)?;

    let mut order: Vec<usize> = (0..logits.len()).collect();
    order.sort_by(|&a, &b| logits[b].total_cmp(&logits[a]));

    let mut cumulative = 0.0f32;
    for (rank, &idx) in order.iter().enumerate() {
        // Mass of strictly better tokens already exceeds p.
        if rank > 0 && cumulative > p {
            logits[idx] = f32::NEG_INFINITY;
        }
        cumulative += probs[idx];
    }

    Ok(())
}

/// Softmax over a logit slice. `-inf` entries map to exactly zero.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>> {
    let logits = Tensor::from_slice(logits, logits.len(), &Device::Cpu)?;
    Ok(candle_nn::ops::softmax(&logits, D::Minus1)?.to_vec1()?)
}

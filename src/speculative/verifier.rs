//! Draft verification by rejection sampling.
//!
//! The target oracle scores the whole drafted sequence in one call. Drafted
//! token `x` at offset `i` is kept with probability `min(1, p(x) / q(x))`,
//! where `p` and `q` are the target and draft distributions at the preceding
//! position. The first rejected token and everything after it are dropped
//! and replaced by one token drawn from the residual distribution
//!
//! ```text
//! p'(x) = max(p(x) - q(x), 0) / Σ_y max(p(y) - q(y), 0)
//! ```
//!
//! If every drafted token survives, one bonus token is drawn from the target
//! distribution at the final position. Together these make each emitted
//! token distributed exactly as if sampled from the target alone.
//!
//! ```text
//! prefix:        [a b c]            prefix_len = 3, γ = 3
//! drafted:       [a b c | x y z]
//! ratios:               .9 .2 ..
//! draws:                .4 .7       -> y rejected, n = 3
//! result:        [a b c x y']       y' ~ residual at position 3
//! ```

use candle_core::{DType, IndexOp, Tensor, D};
use rand::Rng;
use tracing::debug;

use crate::engine::Sampler;
use crate::error::{Error, Result};
use crate::model::{position_logits, DistributionOracle};

/// Outcome of one verification round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Accepted tokens plus the resampled or bonus token.
    pub token_ids: Vec<u32>,
    /// Acceptance boundary n: last index kept from the drafted sequence.
    pub boundary: usize,
    /// Number of drafted tokens accepted.
    pub num_accepted: usize,
    /// Whether the final token came from the residual distribution.
    pub resampled: bool,
}

/// Acceptance ratio `p / q` for a drafted token.
///
/// A zero (or non-finite) draft probability yields 0, which always rejects.
pub fn acceptance_ratio(target_prob: f32, draft_prob: f32) -> f32 {
    if draft_prob > 0.0 && draft_prob.is_finite() {
        target_prob / draft_prob
    } else {
        0.0
    }
}

/// Count how many leading drafted tokens are accepted.
///
/// Token `i` is accepted iff `r <= ratios[i]` with `r` taken from `uniform`.
/// Ratios of at least 1 accept without consuming a draw, and ratios of 0
/// (or NaN) reject without one.
pub fn accepted_prefix_len<F>(ratios: &[f32], mut uniform: F) -> usize
where
    F: FnMut() -> f32,
{
    for (i, &ratio) in ratios.iter().enumerate() {
        if ratio >= 1.0 {
            continue;
        }
        if ratio.is_nan() || ratio <= 0.0 {
            return i;
        }
        if uniform() > ratio {
            return i;
        }
    }
    ratios.len()
}

/// Residual distribution `norm(max(p - q, 0))` for 1D probability tensors.
///
/// Returns `None` when `p <= q` everywhere, i.e. there is no residual mass.
pub fn residual_distribution(target_probs: &Tensor, draft_probs: &Tensor) -> Result<Option<Tensor>> {
    let residual = (target_probs - draft_probs)?.relu()?;
    let mass = residual.sum_all()?.to_scalar::<f32>()?;

    if !mass.is_finite() || mass <= 0.0 {
        return Ok(None);
    }
    Ok(Some((residual / mass as f64)?))
}

/// Softmax of a single position, computed row by row so that equal logits
/// always give bit-identical probabilities.
fn row_probs(logits: &Tensor, pos: usize) -> Result<Tensor> {
    Ok(candle_nn::ops::softmax(&logits.i(pos)?, D::Minus1)?)
}

/// Verifies drafted tokens against the target oracle.
#[derive(Debug, Clone)]
pub struct Verifier {
    sampler: Sampler,
}

impl Verifier {
    pub fn new(sampler: Sampler) -> Self {
        Self { sampler }
    }

    /// Verify `gamma` drafted tokens at the end of `token_ids`.
    ///
    /// `draft_logits` must cover positions `0..prefix_len + gamma - 1`.
    /// Acceptance compares plain softmax distributions; temperature and
    /// truncation only apply when a token is actually drawn.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyPrefix`] / [`Error::InvalidGamma`] on bad window bounds
    /// - [`Error::ShapeMismatch`] if the sequence or logits do not match the window
    /// - any oracle or sampler error
    pub fn verify<O, R>(
        &self,
        mut token_ids: Vec<u32>,
        prefix_len: usize,
        gamma: usize,
        draft_logits: &Tensor,
        target: &O,
        rng: &mut R,
    ) -> Result<Verification>
    where
        O: DistributionOracle + ?Sized,
        R: Rng + ?Sized,
    {
        if prefix_len == 0 {
            return Err(Error::EmptyPrefix);
        }
        if gamma == 0 {
            return Err(Error::InvalidGamma(gamma));
        }
        if token_ids.len() != prefix_len + gamma {
            return Err(Error::ShapeMismatch {
                expected: format!("{} tokens", prefix_len + gamma),
                actual: format!("{} tokens", token_ids.len()),
            });
        }

        let (draft_rows, draft_vocab) = draft_logits.dims2()?;
        if draft_rows < prefix_len + gamma - 1 || draft_vocab != target.vocab_size() {
            return Err(Error::ShapeMismatch {
                expected: format!("[>= {}, {}]", prefix_len + gamma - 1, target.vocab_size()),
                actual: format!("[{draft_rows}, {draft_vocab}]"),
            });
        }

        let target_logits = position_logits(target, &token_ids)?;
        let draft_logits = draft_logits.to_dtype(DType::F32)?;

        let mut ratios = Vec::with_capacity(gamma);
        for i in 0..gamma {
            let pos = prefix_len + i - 1;
            let token = token_ids[prefix_len + i] as usize;
            let p = row_probs(&target_logits, pos)?.i(token)?.to_scalar::<f32>()?;
            let q = row_probs(&draft_logits, pos)?.i(token)?.to_scalar::<f32>()?;
            ratios.push(acceptance_ratio(p, q));
        }

        let num_accepted = accepted_prefix_len(&ratios, || rng.gen::<f32>());
        let boundary = prefix_len + num_accepted - 1;
        token_ids.truncate(boundary + 1);

        let resampled = num_accepted < gamma;
        let next = if resampled {
            debug!(
                position = boundary + 1,
                ratio = ratios[num_accepted],
                "draft token rejected"
            );
            let residual = residual_distribution(
                &row_probs(&target_logits, boundary)?,
                &row_probs(&draft_logits, boundary)?,
            )?;
            match residual {
                // Log space keeps zero-mass entries at -inf through the sampler.
                Some(residual) => self.sampler.sample(&residual.log()?, rng)?,
                None => self.sampler.sample(&target_logits.i(boundary)?, rng)?,
            }
        } else {
            self.sampler.sample(&target_logits.i(boundary)?, rng)?
        };
        token_ids.push(next);

        debug!(boundary, num_accepted, resampled, next, "verified");

        Ok(Verification {
            token_ids,
            boundary,
            num_accepted,
            resampled,
        })
    }

    /// Get the sampler.
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }
}

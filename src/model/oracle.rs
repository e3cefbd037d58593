//! Distribution oracle interface.
//!
//! An oracle maps a token sequence to one logit vector per position.
//! The draft and target models are both oracles; their internals are
//! not this crate's concern.

use candle_core::{DType, Tensor};

use crate::error::{Error, Result};

/// A model seen as a pure function from tokens to per-position logits.
///
/// `forward` must be deterministic and causal: the logits at position `t`
/// may only depend on `token_ids[..=t]`.
pub trait DistributionOracle {
    /// Compute logits for every position of `token_ids`.
    ///
    /// Returns a tensor of shape `[seq_len, vocab_size]` or
    /// `[1, seq_len, vocab_size]`.
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor>;

    /// Size of the vocabulary the logits range over.
    fn vocab_size(&self) -> usize;
}

impl<O: DistributionOracle + ?Sized> DistributionOracle for &O {
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor> {
        (**self).forward(token_ids)
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }
}

impl<O: DistributionOracle + ?Sized> DistributionOracle for Box<O> {
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor> {
        (**self).forward(token_ids)
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }
}

/// Run `oracle` and normalize its output to an f32 `[seq_len, vocab_size]` tensor.
///
/// # Errors
///
/// - [`Error::EmptyPrefix`] for an empty input
/// - [`Error::BatchSize`] when a 3D output has a batch dimension other than 1
/// - [`Error::ShapeMismatch`] when the sequence or vocabulary dims disagree
pub fn position_logits<O>(oracle: &O, token_ids: &[u32]) -> Result<Tensor>
where
    O: DistributionOracle + ?Sized,
{
    if token_ids.is_empty() {
        return Err(Error::EmptyPrefix);
    }

    let logits = oracle.forward(token_ids)?;
    let dims = logits.dims().to_vec();
    let logits = match dims.as_slice() {
        [_, _] => logits,
        [1, _, _] => logits.squeeze(0)?,
        [batch, _, _] => return Err(Error::BatchSize(*batch)),
        dims => {
            return Err(Error::ShapeMismatch {
                expected: "[seq_len, vocab_size]".to_string(),
                actual: format!("{dims:?}"),
            })
        }
    };

    let (seq_len, vocab_size) = logits.dims2()?;
    if seq_len != token_ids.len() || vocab_size != oracle.vocab_size() {
        return Err(Error::ShapeMismatch {
            expected: format!("[{}, {}]", token_ids.len(), oracle.vocab_size()),
            actual: format!("[{seq_len}, {vocab_size}]"),
        });
    }

    Ok(logits.to_dtype(DType::F32)?)
}

//! Sequence tracking for generation requests.
//!
//! A sequence holds the prompt and the tokens generated for it so far.
//! It is created from a non-empty prefix and only ever grows, except for
//! the final trim that drops tokens past the requested length.

use crate::error::{Error, Result};

/// Reason for sequence completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Requested number of new tokens reached.
    MaxTokens,
    /// Aborted by the caller between rounds.
    Aborted,
}

impl FinishReason {
    /// Get the reason name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxTokens => "MaxTokens",
            Self::Aborted => "Aborted",
        }
    }
}

/// A sequence represents a single generation request.
///
/// # Example
///
/// ```
/// use speculative_sampling::core::sequence::Sequence;
///
/// let mut seq = Sequence::new(vec![1, 2, 3, 4]).unwrap();
/// assert_eq!(seq.prompt_len(), 4);
/// assert_eq!(seq.output_len(), 0);
///
/// seq.append_token(5);
/// assert_eq!(seq.output_len(), 1);
/// assert_eq!(seq.total_len(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// Prompt token IDs.
    prompt_token_ids: Vec<u32>,
    /// Generated output token IDs.
    output_token_ids: Vec<u32>,
    /// Reason for finishing (if finished).
    finish_reason: Option<FinishReason>,
}

impl Sequence {
    /// Create a new sequence from prompt tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPrefix`] if `prompt_token_ids` is empty.
    pub fn new(prompt_token_ids: Vec<u32>) -> Result<Self> {
        if prompt_token_ids.is_empty() {
            return Err(Error::EmptyPrefix);
        }
        Ok(Self {
            prompt_token_ids,
            output_token_ids: Vec::new(),
            finish_reason: None,
        })
    }

    /// Get the prompt token IDs.
    pub fn prompt_token_ids(&self) -> &[u32] {
        &self.prompt_token_ids
    }

    /// Get the output token IDs.
    pub fn output_token_ids(&self) -> &[u32] {
        &self.output_token_ids
    }

    /// Get all token IDs (prompt + output).
    pub fn all_token_ids(&self) -> Vec<u32> {
        let mut tokens = self.prompt_token_ids.clone();
        tokens.extend(&self.output_token_ids);
        tokens
    }

    /// Get the prompt length.
    pub fn prompt_len(&self) -> usize {
        self.prompt_token_ids.len()
    }

    /// Get the output length.
    pub fn output_len(&self) -> usize {
        self.output_token_ids.len()
    }

    /// Get the total length (prompt + output).
    pub fn total_len(&self) -> usize {
        self.prompt_len() + self.output_len()
    }

    /// Get the last token ID.
    pub fn last_token_id(&self) -> u32 {
        match self.output_token_ids.last() {
            Some(&token) => token,
            None => self.prompt_token_ids[self.prompt_token_ids.len() - 1],
        }
    }

    /// Append a generated token.
    pub fn append_token(&mut self, token_id: u32) {
        self.output_token_ids.push(token_id);
    }

    /// Append several generated tokens.
    pub fn extend_tokens(&mut self, token_ids: &[u32]) {
        self.output_token_ids.extend_from_slice(token_ids);
    }

    /// Drop generated tokens beyond `max_output_len`.
    pub fn truncate_output(&mut self, max_output_len: usize) {
        self.output_token_ids.truncate(max_output_len);
    }

    /// Mark the sequence as finished.
    pub fn set_finished(&mut self, reason: FinishReason) {
        self.finish_reason = Some(reason);
    }

    /// Get the finish reason (if finished).
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Check if the sequence is finished.
    pub fn is_finished(&self) -> bool {
        self.finish_reason.is_some()
    }
}

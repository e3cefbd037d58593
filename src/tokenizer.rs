//! Text encoding and decoding.
//!
//! Thin wrapper over a HuggingFace `tokenizer.json`. The draft and target
//! oracles must share this vocabulary.

use std::path::Path;

use tokenizers::Tokenizer;

use crate::error::{Error, Result};

/// Encodes prompts to token ids and decodes generated ids back to text.
pub struct TextCodec {
    tokenizer: Tokenizer,
}

impl TextCodec {
    /// Load a tokenizer from a `tokenizer.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            Error::Tokenization(format!("failed to load {}: {e}", path.display()))
        })?;
        Ok(Self { tokenizer })
    }

    /// Wrap an already constructed tokenizer.
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Encode text to token ids (no special tokens added).
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::Tokenization(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decode token ids to text, skipping special tokens.
    pub fn decode(&self, token_ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(token_ids, true)
            .map_err(|e| Error::Tokenization(e.to_string()))
    }

    /// Vocabulary size including added tokens.
    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}

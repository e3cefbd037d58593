//! Speculative decoding configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for speculative decoding.
///
/// Each round the draft oracle proposes `gamma` tokens, then the target
/// oracle verifies all of them in a single forward pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeculativeConfig {
    /// Number of tokens to speculate per round (γ).
    /// Higher values pay off only while the acceptance rate stays high.
    pub gamma: usize,
}

impl Default for SpeculativeConfig {
    fn default() -> Self {
        Self { gamma: 4 }
    }
}

impl SpeculativeConfig {
    /// Create a config with the given lookahead.
    pub fn new(gamma: usize) -> Self {
        Self { gamma }
    }

    /// Set the number of speculative tokens.
    pub fn gamma(mut self, gamma: usize) -> Self {
        self.gamma = gamma;
        self
    }

    /// Check that `gamma >= 1`.
    pub fn validate(&self) -> Result<()> {
        if self.gamma == 0 {
            return Err(Error::InvalidGamma(self.gamma));
        }
        Ok(())
    }
}

//! Configuration types for speculative sampling.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::speculative::SpeculativeConfig;

/// Token id the sampler refuses to emit unless told otherwise.
pub const DEFAULT_FORBIDDEN_TOKEN: u32 = 0;

/// Sampling configuration.
///
/// Shared by every sampling site of a request: autoregressive steps,
/// draft proposals, residual resampling and the bonus token after a fully
/// accepted round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Temperature for scaling logits (must be > 0).
    pub temperature: f32,
    /// Top-k sampling (0 = disabled).
    pub top_k: usize,
    /// Top-p (nucleus) sampling (0.0 = disabled).
    pub top_p: f32,
    /// Token id that must never be emitted (`None` = no check).
    pub forbidden_token: Option<u32>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 0,
            top_p: 0.0,
            forbidden_token: Some(DEFAULT_FORBIDDEN_TOKEN),
        }
    }
}

impl SamplingConfig {
    /// Set the temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set top-k.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set top-p.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set the forbidden token id.
    pub fn forbidden_token(mut self, token: Option<u32>) -> Self {
        self.forbidden_token = token;
        self
    }

    /// Check the parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTemperature`] for non-positive or non-finite
    /// temperatures and [`Error::InvalidTopP`] for top-p outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(Error::InvalidTemperature(self.temperature));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(Error::InvalidTopP(self.top_p));
        }
        Ok(())
    }
}

/// Complete configuration of one generation request.
///
/// The request length and seed live here only; generators take them as
/// call arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Sampling parameters.
    pub sampling: SamplingConfig,
    /// Speculative decoding parameters.
    pub speculative: SpeculativeConfig,
    /// Number of new tokens to generate.
    pub max_new_tokens: usize,
    /// Seed for the request-scoped random generator.
    pub seed: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            speculative: SpeculativeConfig::default(),
            max_new_tokens: 20,
            seed: 123,
        }
    }
}

impl GenerationConfig {
    /// Validate both sections.
    pub fn validate(&self) -> Result<()> {
        self.sampling.validate()?;
        self.speculative.validate()
    }
}

/// Load a generation config from a JSON file.
///
/// Fields missing from the file keep their default values.
pub fn load_generation_config(path: impl AsRef<Path>) -> Result<GenerationConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    let config: GenerationConfig = serde_json::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

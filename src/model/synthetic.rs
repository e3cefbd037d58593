//! Synthetic oracles.
//!
//! Hand-built distribution oracles used by tests and by the CLI driver in
//! place of real draft/target networks:
//!
//! - [`UniformOracle`]: all-zero logits (uniform distribution everywhere)
//! - [`BigramOracle`]: logits at a position depend only on the token there
//! - [`ScriptedOracle`]: fixed logits per position

use std::borrow::Cow;

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::oracle::DistributionOracle;
use crate::error::{Error, Result};

/// Oracle returning zero logits at every position.
#[derive(Debug, Clone)]
pub struct UniformOracle {
    vocab_size: usize,
}

impl UniformOracle {
    pub fn new(vocab_size: usize) -> Self {
        Self { vocab_size }
    }
}

impl DistributionOracle for UniformOracle {
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor> {
        let data = vec![0f32; token_ids.len() * self.vocab_size];
        Ok(Tensor::from_vec(data, (token_ids.len(), self.vocab_size), &Device::Cpu)?)
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

/// Bigram oracle: row `t` holds the next-token logits after token `t`.
///
/// Rows either come from an explicit `[vocab_size, vocab_size]` table or are
/// generated on demand from a seed, which keeps large vocabularies cheap.
/// A noisy copy of a target oracle makes a cheap stand-in for a draft model
/// whose distribution is close to, but not equal to, the target's.
#[derive(Debug, Clone)]
pub struct BigramOracle {
    vocab_size: usize,
    rows: BigramRows,
}

#[derive(Debug, Clone)]
enum BigramRows {
    Table(Vec<f32>),
    Seeded {
        seed: u64,
        scale: f32,
        reserved: Option<u32>,
        noise: Option<(f32, u64)>,
    },
}

impl BigramOracle {
    /// Build from a row-major `[vocab_size, vocab_size]` table.
    pub fn from_table(vocab_size: usize, table: Vec<f32>) -> Result<Self> {
        if vocab_size == 0 || table.len() != vocab_size * vocab_size {
            return Err(Error::ShapeMismatch {
                expected: format!("{} table entries", vocab_size * vocab_size),
                actual: format!("{} table entries", table.len()),
            });
        }
        Ok(Self {
            vocab_size,
            rows: BigramRows::Table(table),
        })
    }

    /// Seeded oracle with logits drawn uniformly from `[-scale, scale)`.
    ///
    /// Column `reserved` is set to negative infinity so that token is never
    /// proposed by either oracle.
    pub fn random(vocab_size: usize, scale: f32, reserved: Option<u32>, seed: u64) -> Result<Self> {
        if vocab_size == 0 {
            return Err(Error::Config("vocabulary must not be empty".to_string()));
        }
        Ok(Self {
            vocab_size,
            rows: BigramRows::Seeded {
                seed,
                scale: scale.abs().max(f32::EPSILON),
                reserved,
                noise: None,
            },
        })
    }

    /// Copy of this oracle with uniform noise in `[-noise, noise)` added to
    /// every finite logit.
    pub fn perturbed(&self, noise: f32, seed: u64) -> Self {
        if noise <= 0.0 {
            return self.clone();
        }

        let rows = match &self.rows {
            BigramRows::Table(table) => {
                let mut table = table.clone();
                for (t, row) in table.chunks_mut(self.vocab_size).enumerate() {
                    add_noise(row, noise, row_seed(seed, t as u32));
                }
                BigramRows::Table(table)
            }
            BigramRows::Seeded {
                seed: base,
                scale,
                reserved,
                ..
            } => BigramRows::Seeded {
                seed: *base,
                scale: *scale,
                reserved: *reserved,
                noise: Some((noise, seed)),
            },
        };

        Self {
            vocab_size: self.vocab_size,
            rows,
        }
    }

    /// Logits row following `token`.
    pub fn row(&self, token: u32) -> Result<Cow<'_, [f32]>> {
        let t = token as usize;
        if t >= self.vocab_size {
            return Err(Error::TokenOutOfRange {
                token,
                vocab_size: self.vocab_size,
            });
        }

        match &self.rows {
            BigramRows::Table(table) => Ok(Cow::Borrowed(
                &table[t * self.vocab_size..(t + 1) * self.vocab_size],
            )),
            BigramRows::Seeded {
                seed,
                scale,
                reserved,
                noise,
            } => {
                let mut rng = StdRng::seed_from_u64(row_seed(*seed, token));
                let mut row: Vec<f32> = (0..self.vocab_size)
                    .map(|_| rng.gen_range(-*scale..*scale))
                    .collect();
                if let Some((noise, noise_seed)) = noise {
                    add_noise(&mut row, *noise, row_seed(*noise_seed, token));
                }
                if let Some(reserved) = reserved.filter(|&r| (r as usize) < self.vocab_size) {
                    row[reserved as usize] = f32::NEG_INFINITY;
                }
                Ok(Cow::Owned(row))
            }
        }
    }
}

fn row_seed(seed: u64, token: u32) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ u64::from(token)
}

fn add_noise(row: &mut [f32], noise: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for v in row.iter_mut() {
        let delta = rng.gen_range(-noise..noise);
        if v.is_finite() {
            *v += delta;
        }
    }
}

impl DistributionOracle for BigramOracle {
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor> {
        let mut data = Vec::with_capacity(token_ids.len() * self.vocab_size);
        for &token in token_ids {
            data.extend_from_slice(&self.row(token)?);
        }
        Ok(Tensor::from_vec(data, (token_ids.len(), self.vocab_size), &Device::Cpu)?)
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

/// Oracle returning fixed logits per position, regardless of token content.
///
/// Positions past the end of the script repeat the last row.
#[derive(Debug, Clone)]
pub struct ScriptedOracle {
    vocab_size: usize,
    rows: Vec<Vec<f32>>,
}

impl ScriptedOracle {
    pub fn new(rows: Vec<Vec<f32>>) -> Result<Self> {
        let vocab_size = rows.first().map(Vec::len).unwrap_or(0);
        if vocab_size == 0 || rows.iter().any(|r| r.len() != vocab_size) {
            return Err(Error::ShapeMismatch {
                expected: "non-empty rows of equal length".to_string(),
                actual: format!("{:?}", rows.iter().map(Vec::len).collect::<Vec<_>>()),
            });
        }
        Ok(Self { vocab_size, rows })
    }
}

impl DistributionOracle for ScriptedOracle {
    fn forward(&self, token_ids: &[u32]) -> Result<Tensor> {
        let last = self.rows.len() - 1;
        let mut data = Vec::with_capacity(token_ids.len() * self.vocab_size);
        for pos in 0..token_ids.len() {
            data.extend_from_slice(&self.rows[pos.min(last)]);
        }
        Ok(Tensor::from_vec(data, (token_ids.len(), self.vocab_size), &Device::Cpu)?)
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

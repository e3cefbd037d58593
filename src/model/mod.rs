//! Distribution oracles.
//!
//! - `oracle`: the trait every draft/target model implements
//! - `synthetic`: hand-built oracles for tests and the demo driver

pub mod oracle;
pub mod synthetic;

pub use oracle::{position_logits, DistributionOracle};
pub use synthetic::{BigramOracle, ScriptedOracle, UniformOracle};

//! Scenario errors.

use cb_01_block_synthesis::SynthesisError;
use cb_02_compact_relay::RelayError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for scenario steps.
pub type Result<T> = std::result::Result<T, ScenarioError>;

/// Any failure that aborts the scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Block synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Relay failed: {0}")]
    Relay(#[from] RelayError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Step '{step}': expected {expected}, observed {actual}")]
    OutcomeMismatch {
        step: String,
        expected: String,
        actual: String,
    },
}

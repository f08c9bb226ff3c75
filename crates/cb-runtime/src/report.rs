//! Step outcomes and the scenario report.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, ScenarioError};

/// What the node did in response to one scenario step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The node's best block became `tip`.
    Accepted { tip: String },
    /// The node refused block `tip` with a `reject` message.
    Rejected { tip: String, reason: String, code: u8 },
    /// A compact-block announcement carried this header id.
    HeaderObserved { header: String },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { tip } => write!(f, "accepted({tip})"),
            Self::Rejected { tip, reason, code } => write!(f, "rejected({tip}, {reason}, {code:#04x})"),
            Self::HeaderObserved { header } => write!(f, "header_observed({header})"),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub step: String,
    pub expected: Outcome,
    pub actual: Outcome,
    pub passed: bool,
}

/// Ordered record of every checked step.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ScenarioReport {
    pub steps: Vec<StepReport>,
}

impl ScenarioReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step and fail on the first mismatch.
    pub fn check(&mut self, step: &str, expected: Outcome, actual: Outcome) -> Result<()> {
        let passed = expected == actual;
        if passed {
            tracing::info!("[cb-runtime] {}: {}", step, actual);
        } else {
            tracing::error!("[cb-runtime] {}: expected {}, observed {}", step, expected, actual);
        }
        self.steps.push(StepReport {
            step: step.to_string(),
            expected: expected.clone(),
            actual: actual.clone(),
            passed,
        });
        if !passed {
            return Err(ScenarioError::OutcomeMismatch {
                step: step.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    pub fn passed(&self) -> bool {
        self.steps.iter().all(|step| step.passed)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

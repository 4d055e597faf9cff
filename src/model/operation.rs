//! AI operation cost records.
//!
//! Each record is produced by one AI execution step (creating a pull request,
//! refining it after review, or summarising it) and is immutable once
//! appended to its pull request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of AI execution that produced a cost record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    #[serde(rename = "PRCreation", alias = "creation")]
    Creation,
    #[serde(rename = "PRRefinement", alias = "refinement")]
    Refinement,
    #[serde(rename = "PRSummary", alias = "summary")]
    Summary,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Creation => "creation",
            Self::Refinement => "refinement",
            Self::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Cost and usage of a single AI execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIOperation {
    #[serde(rename = "type")]
    pub kind: OperationType,
    pub model: String,
    pub cost_usd: f64,
    pub created_at: DateTime<Utc>,
    pub workflow_run_id: u64,
    #[serde(default)]
    pub tokens_input: u64,
    #[serde(default)]
    pub tokens_output: u64,
    #[serde(default)]
    pub duration_seconds: f64,
}

impl AIOperation {
    /// Create a record with zero token and duration usage.
    pub fn new(
        kind: OperationType,
        model: impl Into<String>,
        cost_usd: f64,
        created_at: DateTime<Utc>,
        workflow_run_id: u64,
    ) -> Self {
        Self {
            kind,
            model: model.into(),
            cost_usd,
            created_at,
            workflow_run_id,
            tokens_input: 0,
            tokens_output: 0,
            duration_seconds: 0.0,
        }
    }

    /// Set token usage.
    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = input;
        self.tokens_output = output;
        self
    }

    /// Set wall-clock duration.
    #[must_use]
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Input plus output tokens.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.tokens_input.saturating_add(self.tokens_output)
    }

    /// Reject values a cost record can never legitimately hold.
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if !self.cost_usd.is_finite() || self.cost_usd < 0.0 {
            return Err(format!(
                "AI operation from run {} has invalid cost_usd {}",
                self.workflow_run_id, self.cost_usd
            ));
        }
        if !self.duration_seconds.is_finite() || self.duration_seconds < 0.0 {
            return Err(format!(
                "AI operation from run {} has invalid duration_seconds {}",
                self.workflow_run_id, self.duration_seconds
            ));
        }
        Ok(())
    }
}

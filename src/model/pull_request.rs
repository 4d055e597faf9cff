//! Pull requests recorded against a project's tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AIOperation;
use crate::identity::{parse_branch_name, TaskRef};

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    #[serde(alias = "OPEN")]
    Open,
    #[serde(alias = "CLOSED")]
    Closed,
    #[serde(alias = "MERGED")]
    Merged,
}

impl PrState {
    /// Parse a state string as reported by the hosting API (any case).
    #[must_use]
    pub fn parse(state: &str) -> Option<Self> {
        match state.to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "merged" => Some(Self::Merged),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        };
        f.write_str(name)
    }
}

/// A pull request for one task.
///
/// Several records may share a `task_index` when a task was retried; the
/// most recently created one decides the task's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub task_index: u32,
    pub pr_number: u64,
    pub branch_name: String,
    pub reviewer: String,
    pub pr_state: PrState,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub ai_operations: Vec<AIOperation>,
}

impl PullRequest {
    /// Create an open pull request with no recorded AI operations.
    pub fn new(
        task_index: u32,
        pr_number: u64,
        branch_name: impl Into<String>,
        reviewer: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_index,
            pr_number,
            branch_name: branch_name.into(),
            reviewer: reviewer.into(),
            pr_state: PrState::Open,
            created_at,
            title: None,
            ai_operations: Vec::new(),
        }
    }

    /// Set the lifecycle state.
    #[must_use]
    pub fn with_state(mut self, state: PrState) -> Self {
        self.pr_state = state;
        self
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append an AI operation.
    #[must_use]
    pub fn with_operation(mut self, operation: AIOperation) -> Self {
        self.ai_operations.push(operation);
        self
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.pr_state == PrState::Open
    }

    /// Task reference encoded in the branch name, if it follows the convention.
    #[must_use]
    pub fn task_ref(&self, project: &str) -> Option<TaskRef> {
        parse_branch_name(&self.branch_name, project)
    }

    /// Sum of `cost_usd` across AI operations.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.ai_operations.iter().map(|op| op.cost_usd).sum()
    }

    /// `(input, output)` token totals across AI operations.
    #[must_use]
    pub fn total_tokens(&self) -> (u64, u64) {
        self.ai_operations.iter().fold((0, 0), |(input, output), op| {
            (
                input.saturating_add(op.tokens_input),
                output.saturating_add(op.tokens_output),
            )
        })
    }

    /// Sum of AI execution time in seconds.
    #[must_use]
    pub fn total_duration(&self) -> f64 {
        self.ai_operations.iter().map(|op| op.duration_seconds).sum()
    }
}

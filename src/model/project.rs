//! Per-project metadata document.
//!
//! One [`ProjectMetadata`] is persisted per project. Task status inside it is
//! a cache of [`ProjectMetadata::sync_task_statuses`], recomputed from the
//! pull-request list every time the document is read or written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AIOperation, PrState, PullRequest, Task, TaskStatus};
use crate::checklist::Checklist;
use crate::error::{Result, StepError};

/// Schema version written by this build.
pub const SCHEMA_VERSION: &str = "2.0";

/// Highest schema major version this build can read.
pub const SUPPORTED_SCHEMA_MAJOR: u32 = 2;

/// Task counts by derived status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
}

/// Everything recorded about one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub schema_version: String,
    pub project: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub pull_requests: Vec<PullRequest>,
}

impl ProjectMetadata {
    /// Metadata for a newly discovered project.
    pub fn create_empty(project: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            project: project.into(),
            last_updated: Utc::now(),
            tasks: Vec::new(),
            pull_requests: Vec::new(),
        }
    }

    /// Stamp `last_updated` with the current time.
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    // =========================================================================
    // Document encoding
    // =========================================================================

    /// Encode as a plain JSON document.
    pub fn to_document(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Encode as the pretty-printed text stored on the metadata branch.
    pub fn to_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// Decode and validate a document stored for `project`.
    pub fn from_document(project: &str, document: serde_json::Value) -> Result<Self> {
        let metadata: Self = serde_json::from_value(document)
            .map_err(|e| StepError::malformed(project, e.to_string()))?;
        metadata.validate(project)?;
        Ok(metadata)
    }

    /// Decode stored text for `project`.
    pub fn from_json(project: &str, text: &str) -> Result<Self> {
        let document: serde_json::Value =
            serde_json::from_str(text).map_err(|e| StepError::malformed(project, e.to_string()))?;
        Self::from_document(project, document)
    }

    fn validate(&self, project: &str) -> Result<()> {
        let major = self
            .schema_version
            .split('.')
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .ok_or_else(|| {
                StepError::malformed(
                    project,
                    format!("unparseable schema_version '{}'", self.schema_version),
                )
            })?;
        if major > SUPPORTED_SCHEMA_MAJOR {
            return Err(StepError::UnsupportedSchema {
                project: project.to_string(),
                version: self.schema_version.clone(),
            });
        }

        for (position, task) in self.tasks.iter().enumerate() {
            let expected = u32::try_from(position + 1).unwrap_or(u32::MAX);
            if task.index != expected {
                return Err(StepError::malformed(
                    project,
                    format!("task at position {expected} has index {}", task.index),
                ));
            }
        }

        for pr in &self.pull_requests {
            for op in &pr.ai_operations {
                op.validate()
                    .map_err(|reason| StepError::malformed(project, reason))?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Status derivation
    // =========================================================================

    /// Status `index` derives to from the recorded pull requests.
    ///
    /// The newest record by `created_at` wins; among records created at the
    /// same instant the one recorded last wins.
    #[must_use]
    pub fn derive_status(&self, index: u32) -> TaskStatus {
        match self.latest_pr_for_task(index).map(|pr| pr.pr_state) {
            None => TaskStatus::Pending,
            Some(PrState::Merged) => TaskStatus::Completed,
            Some(PrState::Open) | Some(PrState::Closed) => TaskStatus::InProgress,
        }
    }

    /// Recompute every task's status from scratch.
    pub fn sync_task_statuses(&mut self) {
        let statuses: Vec<TaskStatus> = self
            .tasks
            .iter()
            .map(|task| self.derive_status(task.index))
            .collect();
        for (task, status) in self.tasks.iter_mut().zip(statuses) {
            task.status = status;
        }
    }

    /// Replace `tasks` with the live checklist and re-derive statuses.
    pub fn sync_tasks_from_checklist(&mut self, checklist: &Checklist) {
        self.tasks = checklist
            .items()
            .iter()
            .map(|item| Task::new(item.index, item.description.clone()))
            .collect();
        self.sync_task_statuses();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[must_use]
    pub fn get_task_by_index(&self, index: u32) -> Option<&Task> {
        self.tasks.iter().find(|task| task.index == index)
    }

    /// Every pull request recorded for `index`, in recorded order.
    #[must_use]
    pub fn prs_for_task(&self, index: u32) -> Vec<&PullRequest> {
        self.pull_requests
            .iter()
            .filter(|pr| pr.task_index == index)
            .collect()
    }

    /// The authoritative pull request for `index`.
    #[must_use]
    pub fn latest_pr_for_task(&self, index: u32) -> Option<&PullRequest> {
        self.pull_requests
            .iter()
            .filter(|pr| pr.task_index == index)
            .max_by_key(|pr| pr.created_at)
    }

    #[must_use]
    pub fn pull_request(&self, pr_number: u64) -> Option<&PullRequest> {
        self.pull_requests.iter().find(|pr| pr.pr_number == pr_number)
    }

    /// Open pull requests in recorded order.
    pub fn open_pull_requests(&self) -> impl Iterator<Item = &PullRequest> {
        self.pull_requests.iter().filter(|pr| pr.is_open())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Record a pull request, replacing any earlier record with the same number.
    pub fn add_pull_request(&mut self, pr: PullRequest) {
        match self
            .pull_requests
            .iter_mut()
            .find(|existing| existing.pr_number == pr.pr_number)
        {
            Some(existing) => *existing = pr,
            None => self.pull_requests.push(pr),
        }
        self.sync_task_statuses();
    }

    /// Move a recorded pull request to `state`.
    pub fn set_pr_state(&mut self, pr_number: u64, state: PrState) -> Result<()> {
        self.pull_request_mut(pr_number)?.pr_state = state;
        self.sync_task_statuses();
        Ok(())
    }

    /// Append an AI operation to a recorded pull request.
    pub fn record_ai_operation(&mut self, pr_number: u64, operation: AIOperation) -> Result<()> {
        self.pull_request_mut(pr_number)?.ai_operations.push(operation);
        Ok(())
    }

    fn pull_request_mut(&mut self, pr_number: u64) -> Result<&mut PullRequest> {
        let project = self.project.clone();
        self.pull_requests
            .iter_mut()
            .find(|pr| pr.pr_number == pr_number)
            .ok_or(StepError::UnknownPullRequest { project, pr_number })
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Total AI cost across all pull requests.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.pull_requests.iter().map(PullRequest::total_cost).sum()
    }

    /// `(input, output)` tokens across all pull requests.
    #[must_use]
    pub fn total_tokens(&self) -> (u64, u64) {
        self.pull_requests
            .iter()
            .map(PullRequest::total_tokens)
            .fold((0, 0), |(i, o), (pi, po)| {
                (i.saturating_add(pi), o.saturating_add(po))
            })
    }

    /// AI cost keyed by model identifier.
    #[must_use]
    pub fn cost_by_model(&self) -> BTreeMap<String, f64> {
        let mut costs = BTreeMap::new();
        for op in self.pull_requests.iter().flat_map(|pr| &pr.ai_operations) {
            *costs.entry(op.model.clone()).or_insert(0.0) += op.cost_usd;
        }
        costs
    }

    #[must_use]
    pub fn progress_stats(&self) -> ProgressStats {
        let mut stats = ProgressStats {
            total: self.tasks.len(),
            ..ProgressStats::default()
        };
        for task in &self.tasks {
            match task.status {
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Pending => stats.pending += 1,
            }
        }
        stats
    }

    /// Completed tasks as a percentage of all tasks (0.0 when there are none).
    #[must_use]
    pub fn completion_percentage(&self) -> f64 {
        let stats = self.progress_stats();
        if stats.total == 0 {
            return 0.0;
        }
        stats.completed as f64 / stats.total as f64 * 100.0
    }
}

//! Checklist tasks as recorded in project metadata.

use serde::{Deserialize, Serialize};

use crate::identity::{generate_task_hash, TaskHash};

/// Derived status of a task.
///
/// Never edited directly: [`super::ProjectMetadata::sync_task_statuses`]
/// recomputes it from the pull requests on every read and write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Get a human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One checklist entry.
///
/// `index` is the 1-based checklist position at the last sync and may shift;
/// `description` is the durable identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub index: u32,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    /// Create a pending task.
    pub fn new(index: u32, description: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
            status: TaskStatus::Pending,
        }
    }

    /// Content hash of the description.
    #[must_use]
    pub fn hash(&self) -> TaskHash {
        generate_task_hash(&self.description)
    }
}

//! Custom error types for ClaudeStep.
//!
//! Absence (a missing branch, file or project) is never an error here: the
//! store and the hosting seam report it as `None`. Everything that *is* an
//! error carries enough context (project, operation, cause) to diagnose a run
//! without replaying it.

use std::path::PathBuf;
use thiserror::Error;

use crate::hosting::HostingError;

/// Main error type for ClaudeStep operations
#[derive(Error, Debug)]
pub enum StepError {
    // =========================================================================
    // Metadata Store Errors
    // =========================================================================
    /// Optimistic-concurrency collision that survived every retry
    #[error("Conflict writing metadata for '{project}' after {attempts} attempt(s)")]
    Conflict { project: String, attempts: u32 },

    /// The hosting API rejected a request for a reason other than absence or conflict
    #[error("Hosting API error during {operation} for '{project}': {message}")]
    Hosting {
        project: String,
        operation: String,
        message: String,
    },

    /// Stored JSON failed schema parsing
    #[error("Malformed metadata document for '{project}': {reason}")]
    MalformedDocument { project: String, reason: String },

    /// Stored document was written by a newer schema than this build understands
    #[error("Unsupported schema version '{version}' in metadata for '{project}'")]
    UnsupportedSchema { project: String, version: String },

    /// Mutation referenced a pull request the project does not record
    #[error("Pull request #{pr_number} is not recorded for project '{project}'")]
    UnknownPullRequest { project: String, pr_number: u64 },

    // =========================================================================
    // Checklist Errors
    // =========================================================================
    /// The live checklist could not be read
    #[error("Checklist unavailable at {path}: {reason}")]
    ChecklistUnavailable { path: String, reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StepError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed document error
    pub fn malformed(project: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            project: project.into(),
            reason: reason.into(),
        }
    }

    /// Create a checklist error
    pub fn checklist(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChecklistUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Attach project and operation context to a hosting failure.
    ///
    /// A conflict maps to [`StepError::Conflict`] with a single attempt;
    /// callers that retried use their own attempt count instead.
    pub fn hosting(project: &str, operation: &str, err: HostingError) -> Self {
        match err {
            HostingError::Conflict { .. } => Self::Conflict {
                project: project.to_string(),
                attempts: 1,
            },
            other => Self::Hosting {
                project: project.to_string(),
                operation: operation.to_string(),
                message: other.to_string(),
            },
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if retrying the same cycle could succeed
    ///
    /// Only conflicts are retried; transport errors are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }

    /// Check if this error aborts the current cycle
    ///
    /// Every store failure is fatal to the cycle but never to stored state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnknownPullRequest { .. })
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Conflict { .. } => 2,
            Self::Hosting { .. } => 3,
            Self::MalformedDocument { .. } | Self::UnsupportedSchema { .. } => 4,
            Self::ChecklistUnavailable { .. } => 5,
            Self::UnknownPullRequest { .. } => 6,
            Self::Config { .. } | Self::InvalidConfig { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for ClaudeStep results
pub type Result<T> = std::result::Result<T, StepError>;

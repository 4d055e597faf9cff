//! ClaudeStep - metadata reconciliation for AI-driven task pipelines
//!
//! Tracks a project's checklist tasks, the pull requests opened for them and
//! the AI cost of each pull request in one JSON document per project,
//! stored on a dedicated branch of the hosted repository.
//!
//! # Architecture
//!
//! - [`identity`] - task hashes, task references and branch naming
//! - [`model`] - the persisted [`ProjectMetadata`] document and its parts
//! - [`checklist`] - the live task list parsed from `spec.md`
//! - [`hosting`] - the narrow hosting API seam and its `gh` implementation
//! - [`store`] - conditional read/write of metadata with conflict retry
//! - [`reconcile`] - next task, skip-sets and orphaned pull requests
//! - [`reviewer`] - reviewer capacity assignment
//! - [`config`] - driver settings and per-project configuration
//! - [`stats`] - cross-project summaries
//! - [`testing`] - mock hosting and fixtures
//!
//! # Example
//!
//! ```rust,ignore
//! use claudestep::{BranchMetadataStore, Checklist, GhCli, MetadataStore, TaskReconciler};
//!
//! let hosting = GhCli::new("acme/widgets").with_label("claudestep");
//! let store = BranchMetadataStore::new(&hosting, "claudestep-metadata");
//! store.ensure_branch_exists()?;
//!
//! let checklist = Checklist::from_branch(&hosting, "claude-step/auth/spec.md", "main")?;
//! let metadata = store.get_project("auth")?;
//! let reconciler = TaskReconciler::new(&hosting, "auth");
//! let next = reconciler.next_available_task(&checklist, metadata.as_ref());
//! ```

pub mod checklist;
pub mod config;
pub mod error;
pub mod hosting;
pub mod identity;
pub mod model;
pub mod reconcile;
pub mod reviewer;
pub mod stats;
pub mod store;
pub mod testing;

// Re-export commonly used types
pub use error::{Result, StepError};

pub use checklist::{mark_task_complete, Checklist, ChecklistItem};
pub use config::{ProjectConfiguration, ProjectPaths, ReviewerConfig, Settings};
pub use hosting::{GhCli, HostingApi, HostingError, OpenPullRequest, VersionToken};
pub use identity::{
    format_branch_name, generate_task_hash, generate_task_id, parse_any_branch_name,
    parse_branch_name, TaskHash, TaskRef,
};
pub use model::{
    AIOperation, OperationType, PrState, ProjectMetadata, PullRequest, Task, TaskStatus,
};
pub use reconcile::{AvailableTask, MigrationStatus, OrphanedPullRequest, SkipSet, TaskReconciler};
pub use reviewer::{ReviewerCapacityAssignor, ReviewerCapacityReport, ReviewerStatus};
pub use stats::{summarize_projects, ProjectSummary};
pub use store::{BranchMetadataStore, MetadataStore, RetryPolicy, StoredProject};

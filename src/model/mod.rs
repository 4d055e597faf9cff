//! Domain model for project metadata.
//!
//! - [`Task`] - a checklist entry and its derived [`TaskStatus`]
//! - [`AIOperation`] - an append-only AI cost record
//! - [`PullRequest`] - a pull request for one task, with its AI operations
//! - [`ProjectMetadata`] - the persisted per-project document

pub mod operation;
pub mod project;
pub mod pull_request;
pub mod task;

pub use operation::{AIOperation, OperationType};
pub use project::{ProgressStats, ProjectMetadata, SCHEMA_VERSION, SUPPORTED_SCHEMA_MAJOR};
pub use pull_request::{PrState, PullRequest};
pub use task::{Task, TaskStatus};

//! The narrow slice of the version-control hosting API this crate consumes.
//!
//! Everything above this seam (store, reconciliation, reviewer assignment)
//! is written against [`HostingApi`] so it can run against the real `gh`
//! CLI ([`GhCli`]) or an in-memory double
//! ([`crate::testing::MockHosting`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use claudestep::hosting::HostingApi;
//!
//! fn branch_exists(api: &impl HostingApi, branch: &str) -> bool {
//!     matches!(api.get_ref(branch), Ok(Some(_)))
//! }
//! ```

pub mod gh;

pub use gh::GhCli;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::PrState;

/// Opaque revision marker of a stored file (the blob sha on GitHub).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded file content at a ref, with its revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub content: String,
    pub version: VersionToken,
}

/// Kind of a tree listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    #[serde(other)]
    Other,
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
        }
    }
}

/// An open pull request as reported by the live query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPullRequest {
    pub number: u64,
    pub branch_name: String,
    pub state: PrState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub assignees: Vec<String>,
}

impl OpenPullRequest {
    pub fn new(number: u64, branch_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            number,
            branch_name: branch_name.into(),
            state: PrState::Open,
            created_at,
            title: String::new(),
            assignees: Vec::new(),
        }
    }

    /// Add an assignee.
    #[must_use]
    pub fn with_assignee(mut self, login: impl Into<String>) -> Self {
        self.assignees.push(login.into());
        self
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Failures reported by the hosting API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostingError {
    /// The branch, ref or file does not exist
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// A conditional write or delete lost against a concurrent writer
    #[error("Revision conflict on {path}")]
    Conflict { path: String },

    /// A create found the ref already there
    #[error("Already exists: {what}")]
    AlreadyExists { what: String },

    /// Transport failure or any other rejection
    #[error("{operation} failed: {message}")]
    Api { operation: String, message: String },
}

impl HostingError {
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Result alias for hosting calls.
pub type HostingResult<T> = std::result::Result<T, HostingError>;

/// Hosting capabilities consumed by the metadata store and the drivers.
///
/// Absence is reported as `Ok(None)` wherever a caller can act on it.
pub trait HostingApi {
    /// Name of the repository's default branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be queried.
    fn default_branch(&self) -> HostingResult<String>;

    /// Commit sha at the head of `branch`, or `None` if it does not exist.
    fn get_ref(&self, branch: &str) -> HostingResult<Option<String>>;

    /// Create `branch` pointing at `sha`.
    ///
    /// # Errors
    ///
    /// Returns [`HostingError::AlreadyExists`] if the branch exists.
    fn create_ref(&self, branch: &str, sha: &str) -> HostingResult<()>;

    /// File at `path` on `git_ref`, or `None` if the file (or ref) is absent.
    fn get_content(&self, path: &str, git_ref: &str) -> HostingResult<Option<FileContent>>;

    /// Create or update `path` on `branch`.
    ///
    /// With `version`, the write only succeeds if it matches the file's
    /// current revision; without it, only a create is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`HostingError::Conflict`] when the precondition fails.
    fn put_content(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
        version: Option<&VersionToken>,
    ) -> HostingResult<VersionToken>;

    /// Delete `path` on `branch` if it is still at `version`.
    fn delete_content(
        &self,
        path: &str,
        version: &VersionToken,
        branch: &str,
    ) -> HostingResult<()>;

    /// Recursive listing of `branch`, or `None` if the branch does not exist.
    fn list_tree(&self, branch: &str) -> HostingResult<Option<Vec<TreeEntry>>>;

    /// Open pull requests whose branch belongs to `project`.
    fn list_open_pull_requests(&self, project: &str) -> HostingResult<Vec<OpenPullRequest>>;
}

impl<T: HostingApi + ?Sized> HostingApi for &T {
    fn default_branch(&self) -> HostingResult<String> {
        (**self).default_branch()
    }

    fn get_ref(&self, branch: &str) -> HostingResult<Option<String>> {
        (**self).get_ref(branch)
    }

    fn create_ref(&self, branch: &str, sha: &str) -> HostingResult<()> {
        (**self).create_ref(branch, sha)
    }

    fn get_content(&self, path: &str, git_ref: &str) -> HostingResult<Option<FileContent>> {
        (**self).get_content(path, git_ref)
    }

    fn put_content(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
        version: Option<&VersionToken>,
    ) -> HostingResult<VersionToken> {
        (**self).put_content(path, content, message, branch, version)
    }

    fn delete_content(
        &self,
        path: &str,
        version: &VersionToken,
        branch: &str,
    ) -> HostingResult<()> {
        (**self).delete_content(path, version, branch)
    }

    fn list_tree(&self, branch: &str) -> HostingResult<Option<Vec<TreeEntry>>> {
        (**self).list_tree(branch)
    }

    fn list_open_pull_requests(&self, project: &str) -> HostingResult<Vec<OpenPullRequest>> {
        (**self).list_open_pull_requests(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_entry_decodes_github_listing() {
        let entries: Vec<TreeEntry> = serde_json::from_str(
            r#"[
                {"path": "projects/p1.json", "type": "blob", "sha": "1"},
                {"path": "projects", "type": "tree"},
                {"path": "vendor/lib", "type": "commit"}
            ]"#,
        )
        .unwrap();
        assert_eq!(entries[0].kind, EntryKind::Blob);
        assert_eq!(entries[1].kind, EntryKind::Tree);
        assert_eq!(entries[2].kind, EntryKind::Other);
    }

    #[test]
    fn test_hosting_error_classification() {
        assert!(HostingError::Conflict { path: "x".into() }.is_conflict());
        assert!(HostingError::NotFound { what: "x".into() }.is_not_found());
        assert!(HostingError::AlreadyExists { what: "x".into() }.is_already_exists());
        assert!(!HostingError::api("GET", "boom").is_conflict());
    }
}

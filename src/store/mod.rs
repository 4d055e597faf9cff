//! Persistence of [`ProjectMetadata`] documents.
//!
//! Documents live as `<base_path>/<project>.json` on a dedicated metadata
//! branch. Writes are conditional on the revision that was read, and a
//! conflicting write is retried against a freshly read document via a
//! caller-supplied recompute step, so concurrent drivers never drop each
//! other's updates.
//!
//! # Example
//!
//! ```rust,ignore
//! use claudestep::store::{BranchMetadataStore, MetadataStore};
//!
//! let store = BranchMetadataStore::new(hosting, "claudestep-metadata");
//! store.ensure_branch_exists()?;
//! let stored = store.update("auth", &mut |metadata| {
//!     metadata.set_pr_state(42, PrState::Merged)
//! })?;
//! ```

pub mod branch;
pub mod retry;

pub use branch::{BranchMetadataStore, DEFAULT_BASE_PATH, PLACEHOLDER_PATH};
pub use retry::RetryPolicy;

pub use crate::hosting::VersionToken;

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::Result;
use crate::model::ProjectMetadata;

/// A document together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProject {
    pub metadata: ProjectMetadata,
    pub version: VersionToken,
}

/// Rebuilds the document to write from the latest stored one (`None` when
/// the project does not exist yet).
pub type Recompute<'a> = dyn FnMut(Option<ProjectMetadata>) -> Result<ProjectMetadata> + 'a;

/// Storage of per-project metadata documents.
pub trait MetadataStore {
    /// Create the metadata branch if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the hosting API cannot query or create it.
    fn ensure_branch_exists(&self) -> Result<()>;

    /// Read a project's document with task statuses re-derived.
    ///
    /// Returns `None` when the document or the branch does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StepError::MalformedDocument`] or
    /// [`crate::StepError::UnsupportedSchema`] for undecodable documents and
    /// [`crate::StepError::Hosting`] for transport failures.
    fn read(&self, project: &str) -> Result<Option<StoredProject>>;

    /// Write `document`, conditional on `version`.
    ///
    /// On a conflict the stored document is re-read, passed to `recompute`,
    /// and the result is written against the new revision. Returns the
    /// document as written.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StepError::Conflict`] once retries are exhausted.
    fn write(
        &self,
        project: &str,
        document: ProjectMetadata,
        version: Option<&VersionToken>,
        recompute: &mut Recompute<'_>,
    ) -> Result<StoredProject>;

    /// Names of all stored projects. Empty when the branch does not exist.
    fn list_project_names(&self) -> Result<BTreeSet<String>>;

    /// Remove a project's document. Absent documents are not an error.
    fn delete(&self, project: &str) -> Result<()>;

    /// Read a project's document, dropping the revision.
    fn get_project(&self, project: &str) -> Result<Option<ProjectMetadata>> {
        Ok(self.read(project)?.map(|stored| stored.metadata))
    }

    fn project_exists(&self, project: &str) -> Result<bool> {
        Ok(self.read(project)?.is_some())
    }

    /// Every stored project, in name order.
    ///
    /// Documents deleted between listing and reading are skipped.
    fn get_all_projects(&self) -> Result<Vec<ProjectMetadata>> {
        let mut projects = Vec::new();
        for name in self.list_project_names()? {
            match self.get_project(&name)? {
                Some(metadata) => projects.push(metadata),
                None => debug!("Project {} disappeared while listing", name),
            }
        }
        Ok(projects)
    }

    /// Projects whose `last_updated` is at or after `since`.
    fn get_projects_modified_since(&self, since: DateTime<Utc>) -> Result<Vec<ProjectMetadata>> {
        Ok(self
            .get_all_projects()?
            .into_iter()
            .filter(|metadata| metadata.last_updated >= since)
            .collect())
    }

    /// Read-modify-write of one project.
    ///
    /// `mutate` is applied to the current document (or a fresh empty one)
    /// and re-applied to the latest document after every conflict, so it
    /// must only express the intended change.
    fn update(
        &self,
        project: &str,
        mutate: &mut dyn FnMut(&mut ProjectMetadata) -> Result<()>,
    ) -> Result<StoredProject> {
        let mut apply = |current: Option<ProjectMetadata>| -> Result<ProjectMetadata> {
            let mut metadata = current.unwrap_or_else(|| ProjectMetadata::create_empty(project));
            mutate(&mut metadata)?;
            Ok(metadata)
        };

        let current = self.read(project)?;
        let version = current.as_ref().map(|stored| stored.version.clone());
        let document = apply(current.map(|stored| stored.metadata))?;
        self.write(project, document, version.as_ref(), &mut apply)
    }
}

//! Task/pull-request reconciliation.
//!
//! Given the live checklist and the project's pull requests (live listing
//! plus stored metadata), decides which task to work on next, which tasks
//! are taken, and which pull requests no longer match any task.
//!
//! The checklist is authoritative and must be readable. The live pull
//! request listing is best-effort: when it fails, reconciliation degrades
//! to the pull requests recorded in metadata and logs a warning.
//!
//! # Example
//!
//! ```rust,ignore
//! use claudestep::reconcile::TaskReconciler;
//!
//! let reconciler = TaskReconciler::new(&hosting, "auth");
//! if let Some(task) = reconciler.next_available_task(&checklist, metadata.as_ref()) {
//!     println!("next: {} ({})", task.description, task.hash);
//! }
//! ```

pub mod orphans;
pub mod skip;

pub use orphans::{detect_orphaned_prs, MigrationStatus, OrphanReason, OrphanedPullRequest};
pub use skip::{
    classify_open_prs, find_next_available_task, merge_pr_refs, metadata_open_prs, AvailableTask,
    PullRequestRef, SkipSet,
};

use tracing::{debug, warn};

use crate::checklist::Checklist;
use crate::error::{Result, StepError};
use crate::hosting::HostingApi;
use crate::model::ProjectMetadata;

/// Reconciles one project against the live hosting state.
#[derive(Debug, Clone)]
pub struct TaskReconciler<H> {
    hosting: H,
    project: String,
}

impl<H: HostingApi> TaskReconciler<H> {
    pub fn new(hosting: H, project: impl Into<String>) -> Self {
        Self {
            hosting,
            project: project.into(),
        }
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Live open pull requests of this project, classified.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Hosting`] if the listing fails.
    pub fn live_open_prs(&self) -> Result<Vec<PullRequestRef>> {
        let prs = self
            .hosting
            .list_open_pull_requests(&self.project)
            .map_err(|e| StepError::hosting(&self.project, "list open pull requests", e))?;
        Ok(classify_open_prs(&self.project, &prs))
    }

    /// Live and recorded open pull requests, one per number.
    ///
    /// Falls back to the recorded ones when the live listing fails.
    #[must_use]
    pub fn open_prs(&self, metadata: Option<&ProjectMetadata>) -> Vec<PullRequestRef> {
        let recorded = metadata.map(metadata_open_prs).unwrap_or_default();
        match self.live_open_prs() {
            Ok(live) => {
                debug!(
                    "{}: {} live and {} recorded open pull requests",
                    self.project,
                    live.len(),
                    recorded.len()
                );
                merge_pr_refs(&[live, recorded])
            }
            Err(e) => {
                warn!(
                    "{}: pull request listing unavailable ({}), using {} recorded open PRs",
                    self.project,
                    e,
                    recorded.len()
                );
                recorded
            }
        }
    }

    /// Tasks that already have an open pull request.
    #[must_use]
    pub fn in_progress_tasks(&self, metadata: Option<&ProjectMetadata>) -> SkipSet {
        SkipSet::from_refs(&self.open_prs(metadata))
    }

    /// First unchecked task with no open pull request.
    #[must_use]
    pub fn next_available_task(
        &self,
        checklist: &Checklist,
        metadata: Option<&ProjectMetadata>,
    ) -> Option<AvailableTask> {
        let skip = self.in_progress_tasks(metadata);
        let next = find_next_available_task(checklist, &skip);
        if next.is_none() {
            debug!("{}: no available task", self.project);
        }
        next
    }

    /// Open pull requests that match no task of `checklist`.
    #[must_use]
    pub fn detect_orphaned_prs(
        &self,
        checklist: &Checklist,
        metadata: Option<&ProjectMetadata>,
    ) -> Vec<OrphanedPullRequest> {
        let orphans = detect_orphaned_prs(checklist, &self.open_prs(metadata));
        for orphan in &orphans {
            warn!(
                "{}: PR #{} ({}) is orphaned: {}",
                self.project, orphan.number, orphan.branch_name, orphan.reason
            );
        }
        orphans
    }

    /// Hash-based versus index-based split of the live open pull requests.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Hosting`] if the listing fails.
    pub fn migration_status(&self) -> Result<MigrationStatus> {
        Ok(MigrationStatus::from_refs(&self.live_open_prs()?))
    }
}

//! [`MetadataStore`] on a dedicated branch of the hosted repository.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::{MetadataStore, Recompute, RetryPolicy, StoredProject, VersionToken};
use crate::error::{Result, StepError};
use crate::hosting::{EntryKind, HostingApi, HostingError};
use crate::model::ProjectMetadata;

/// Directory holding one JSON document per project.
pub const DEFAULT_BASE_PATH: &str = "projects";

/// File committed when the metadata branch is created.
pub const PLACEHOLDER_PATH: &str = "README.md";

const PLACEHOLDER_CONTENT: &str = "# ClaudeStep metadata\n\n\
This branch is managed by ClaudeStep. It holds one JSON document per project\n\
under `projects/`. Do not edit it by hand.\n";

/// Metadata documents stored as files on `branch`.
#[derive(Debug, Clone)]
pub struct BranchMetadataStore<H> {
    hosting: H,
    branch: String,
    base_path: String,
    policy: RetryPolicy,
}

fn is_valid_project_name(project: &str) -> bool {
    !project.is_empty() && !project.contains('/') && !project.contains(char::is_whitespace)
}

impl<H: HostingApi> BranchMetadataStore<H> {
    pub fn new(hosting: H, branch: impl Into<String>) -> Self {
        Self {
            hosting,
            branch: branch.into(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            policy: RetryPolicy::default(),
        }
    }

    /// Store documents under a different directory.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    #[must_use]
    pub fn hosting(&self) -> &H {
        &self.hosting
    }

    /// Path of `project`'s document on the branch.
    #[must_use]
    pub fn document_path(&self, project: &str) -> String {
        format!("{}/{}.json", self.base_path, project)
    }

    /// Project name for a tree entry, if it is a document of this store.
    fn project_name(&self, path: &str) -> Option<String> {
        let name = path
            .strip_prefix(&self.base_path)?
            .strip_prefix('/')?
            .strip_suffix(".json")?;
        if name.contains('/') {
            return None;
        }
        if !is_valid_project_name(name) {
            debug!("Skipping {}: not a valid project name", path);
            return None;
        }
        Some(name.to_string())
    }

    fn check_project_name(project: &str) -> Result<()> {
        if !is_valid_project_name(project) {
            return Err(StepError::invalid_config(
                "project",
                format!("'{project}' is not a valid project name"),
            ));
        }
        Ok(())
    }

    fn put(
        &self,
        project: &str,
        document: &ProjectMetadata,
        version: Option<&VersionToken>,
    ) -> Result<std::result::Result<VersionToken, HostingError>> {
        let text = document.to_json()?;
        let message = format!("Update metadata for {project}");
        Ok(self.hosting.put_content(
            &self.document_path(project),
            &text,
            &message,
            &self.branch,
            version,
        ))
    }
}

impl<H: HostingApi> MetadataStore for BranchMetadataStore<H> {
    fn ensure_branch_exists(&self) -> Result<()> {
        let branch = self.branch.as_str();
        let context = |e: HostingError| StepError::hosting(branch, "ensure metadata branch", e);

        if self.hosting.get_ref(branch).map_err(context)?.is_some() {
            debug!("Metadata branch {} exists", branch);
            return Ok(());
        }

        let default_branch = self.hosting.default_branch().map_err(context)?;
        let sha = self
            .hosting
            .get_ref(&default_branch)
            .map_err(context)?
            .ok_or_else(|| {
                context(HostingError::NotFound {
                    what: format!("default branch {default_branch}"),
                })
            })?;
        match self.hosting.create_ref(branch, &sha) {
            Ok(()) => {}
            Err(HostingError::AlreadyExists { .. }) => {
                debug!("Metadata branch {} was created concurrently", branch);
                return Ok(());
            }
            Err(e) => return Err(context(e)),
        }

        match self.hosting.put_content(
            PLACEHOLDER_PATH,
            PLACEHOLDER_CONTENT,
            "Initialize ClaudeStep metadata branch",
            branch,
            None,
        ) {
            // The branch was cut from a default branch that already has one
            Ok(_) | Err(HostingError::Conflict { .. }) => {}
            Err(e) => return Err(context(e)),
        }

        info!("Created metadata branch {} from {}", branch, default_branch);
        Ok(())
    }

    fn read(&self, project: &str) -> Result<Option<StoredProject>> {
        Self::check_project_name(project)?;
        let file = match self.hosting.get_content(&self.document_path(project), &self.branch) {
            Ok(Some(file)) => file,
            Ok(None) | Err(HostingError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(StepError::hosting(project, "read metadata", e)),
        };

        let mut metadata = ProjectMetadata::from_json(project, &file.content)?;
        metadata.sync_task_statuses();
        Ok(Some(StoredProject {
            metadata,
            version: file.version,
        }))
    }

    fn write(
        &self,
        project: &str,
        document: ProjectMetadata,
        version: Option<&VersionToken>,
        recompute: &mut Recompute<'_>,
    ) -> Result<StoredProject> {
        Self::check_project_name(project)?;
        let mut document = document;
        let mut version = version.cloned();
        let mut retries = 0;

        loop {
            document.touch();
            document.sync_task_statuses();

            match self.put(project, &document, version.as_ref())? {
                Ok(written) => {
                    debug!(
                        "Wrote metadata for {} ({} tasks, {} pull requests)",
                        project,
                        document.tasks.len(),
                        document.pull_requests.len()
                    );
                    return Ok(StoredProject {
                        metadata: document,
                        version: written,
                    });
                }
                Err(HostingError::Conflict { .. }) if self.policy.should_retry(retries) => {
                    retries += 1;
                    let delay = self.policy.delay(retries);
                    warn!(
                        "Metadata for {} changed concurrently, retrying ({}/{}) in {:?}",
                        project, retries, self.policy.max_retries, delay
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }

                    let latest = self.read(project)?;
                    version = latest.as_ref().map(|stored| stored.version.clone());
                    document = recompute(latest.map(|stored| stored.metadata))?;
                }
                Err(HostingError::Conflict { .. }) => {
                    return Err(StepError::Conflict {
                        project: project.to_string(),
                        attempts: retries + 1,
                    });
                }
                Err(e) => return Err(StepError::hosting(project, "write metadata", e)),
            }
        }
    }

    fn list_project_names(&self) -> Result<BTreeSet<String>> {
        let entries = match self.hosting.list_tree(&self.branch) {
            Ok(Some(entries)) => entries,
            Ok(None) | Err(HostingError::NotFound { .. }) => return Ok(BTreeSet::new()),
            Err(e) => return Err(StepError::hosting(&self.branch, "list projects", e)),
        };

        Ok(entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Blob)
            .filter_map(|entry| self.project_name(&entry.path))
            .collect())
    }

    fn delete(&self, project: &str) -> Result<()> {
        Self::check_project_name(project)?;
        let path = self.document_path(project);
        let file = match self.hosting.get_content(&path, &self.branch) {
            Ok(Some(file)) => file,
            Ok(None) | Err(HostingError::NotFound { .. }) => {
                debug!("No metadata to delete for {}", project);
                return Ok(());
            }
            Err(e) => return Err(StepError::hosting(project, "delete metadata", e)),
        };

        match self.hosting.delete_content(&path, &file.version, &self.branch) {
            Ok(()) => {
                info!("Deleted metadata for {}", project);
                Ok(())
            }
            Err(HostingError::NotFound { .. }) => Ok(()),
            Err(e) => Err(StepError::hosting(project, "delete metadata", e)),
        }
    }
}

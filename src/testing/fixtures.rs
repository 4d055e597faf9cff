//! Pre-built metadata and checklists for tests and benchmarks.

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::mocks::MockHosting;
use crate::checklist::Checklist;
use crate::config::{ProjectConfiguration, ReviewerConfig, DEFAULT_METADATA_BRANCH};
use crate::identity::{format_branch_name, generate_task_hash, TaskRef};
use crate::model::{AIOperation, OperationType, PrState, ProjectMetadata, PullRequest};
use crate::store::DEFAULT_BASE_PATH;

/// Project name used throughout the fixtures.
pub const FIXTURE_PROJECT: &str = "auth";

/// A five-task checklist with the first task done.
pub const SAMPLE_SPEC: &str = "\
# Authentication

Work through these in order.

- [x] Create user table
- [ ] Add login endpoint
- [ ] Hash passwords with argon2
- [ ] Add session expiry
- [ ] Write API docs
";

/// Deterministic timestamp, `minutes` after a fixed epoch.
#[must_use]
pub fn fixed_time(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
        + Duration::minutes(minutes)
}

/// Two reviewers, `alice` (1 slot) then `bob` (2 slots).
#[must_use]
pub fn sample_configuration() -> ProjectConfiguration {
    ProjectConfiguration::new(
        FIXTURE_PROJECT,
        vec![ReviewerConfig::new("alice", 1), ReviewerConfig::new("bob", 2)],
    )
}

/// Hash-based branch name for `description` in the fixture project.
#[must_use]
pub fn hash_branch(description: &str) -> String {
    format_branch_name(FIXTURE_PROJECT, &TaskRef::ByHash(generate_task_hash(description)))
}

/// Index-based (legacy) branch name for `index` in the fixture project.
#[must_use]
pub fn index_branch(index: u32) -> String {
    format_branch_name(FIXTURE_PROJECT, &TaskRef::ByIndex(index))
}

/// Builder for [`ProjectMetadata`] documents.
///
/// # Example
///
/// ```rust,ignore
/// let metadata = MetadataFixture::new("auth")
///     .with_checklist(SAMPLE_SPEC)
///     .with_pr(1, 10, "alice", PrState::Merged)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct MetadataFixture {
    metadata: ProjectMetadata,
    clock: i64,
}

impl MetadataFixture {
    #[must_use]
    pub fn new(project: &str) -> Self {
        let mut metadata = ProjectMetadata::create_empty(project);
        metadata.last_updated = fixed_time(0);
        Self { metadata, clock: 0 }
    }

    /// Tasks from checklist text.
    #[must_use]
    pub fn with_checklist(mut self, spec: &str) -> Self {
        self.metadata.sync_tasks_from_checklist(&Checklist::parse(spec));
        self
    }

    /// A pull request for task `index` on a hash-based branch (legacy
    /// index branch when the task is unknown).
    #[must_use]
    pub fn with_pr(self, index: u32, number: u64, reviewer: &str, state: PrState) -> Self {
        let task_ref = match self.metadata.get_task_by_index(index) {
            Some(task) => TaskRef::ByHash(task.hash()),
            None => TaskRef::ByIndex(index),
        };
        let branch = format_branch_name(&self.metadata.project, &task_ref);
        self.with_pr_on_branch(index, number, &branch, reviewer, state)
    }

    /// A pull request on an explicit branch.
    #[must_use]
    pub fn with_pr_on_branch(
        mut self,
        index: u32,
        number: u64,
        branch: &str,
        reviewer: &str,
        state: PrState,
    ) -> Self {
        self.clock += 1;
        let created = fixed_time(self.clock);
        let pr = PullRequest::new(index, number, branch, reviewer, created)
            .with_state(state)
            .with_title(format!("Task {index}"));
        self.metadata.add_pull_request(pr);
        self
    }

    /// A creation cost record on pull request `number`.
    #[must_use]
    pub fn with_cost(mut self, number: u64, model: &str, cost_usd: f64) -> Self {
        self.clock += 1;
        let created = fixed_time(self.clock);
        let op = AIOperation::new(OperationType::Creation, model, cost_usd, created, number)
            .with_tokens(1_000, 500)
            .with_duration(30.0);
        if let Some(pr) = self
            .metadata
            .pull_requests
            .iter_mut()
            .find(|pr| pr.pr_number == number)
        {
            pr.ai_operations.push(op);
        }
        self
    }

    #[must_use]
    pub fn build(self) -> ProjectMetadata {
        self.metadata
    }
}

/// Document path of `project` under the default base path.
#[must_use]
pub fn document_path(project: &str) -> String {
    format!("{DEFAULT_BASE_PATH}/{project}.json")
}

/// Mock repository whose metadata branch already holds `documents`.
#[must_use]
pub fn seeded_hosting(documents: &[ProjectMetadata]) -> MockHosting {
    let mut hosting = MockHosting::new().with_branch(DEFAULT_METADATA_BRANCH);
    for metadata in documents {
        let text = metadata.to_json().unwrap_or_default();
        let path = document_path(&metadata.project);
        hosting = hosting.with_file(DEFAULT_METADATA_BRANCH, &path, &text);
    }
    hosting
}

//! Cross-project progress and cost summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::{PrState, ProgressStats, ProjectMetadata};
use crate::store::MetadataStore;

/// Progress and cost rollup of one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project: String,
    pub last_updated: DateTime<Utc>,
    pub progress: ProgressStats,
    pub completion_percentage: f64,
    pub open_prs: usize,
    pub merged_prs: usize,
    pub total_cost_usd: f64,
    pub tokens_input: u64,
    pub tokens_output: u64,
}

impl ProjectSummary {
    #[must_use]
    pub fn from_metadata(metadata: &ProjectMetadata) -> Self {
        let count = |state: PrState| {
            metadata
                .pull_requests
                .iter()
                .filter(|pr| pr.pr_state == state)
                .count()
        };
        let (tokens_input, tokens_output) = metadata.total_tokens();
        Self {
            project: metadata.project.clone(),
            last_updated: metadata.last_updated,
            progress: metadata.progress_stats(),
            completion_percentage: metadata.completion_percentage(),
            open_prs: count(PrState::Open),
            merged_prs: count(PrState::Merged),
            total_cost_usd: metadata.total_cost(),
            tokens_input,
            tokens_output,
        }
    }
}

/// Summaries of every project, or only those updated at or after `since`.
///
/// # Errors
///
/// Propagates store failures.
pub fn summarize_projects(
    store: &impl MetadataStore,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<ProjectSummary>> {
    let projects = match since {
        Some(since) => store.get_projects_modified_since(since)?,
        None => store.get_all_projects()?,
    };
    Ok(projects.iter().map(ProjectSummary::from_metadata).collect())
}

/// Sum of every summary's cost.
#[must_use]
pub fn total_cost(summaries: &[ProjectSummary]) -> f64 {
    summaries.iter().map(|s| s.total_cost_usd).sum()
}

//! Reviewer capacity assignment.
//!
//! Reviewers are tried in configuration order; the first one whose open
//! pull request count is below their `maxOpenPRs` is selected. When nobody
//! has room the report says so and no pull request should be opened this
//! cycle. That is a normal outcome, not an error.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::{ProjectConfiguration, ReviewerConfig};
use crate::hosting::OpenPullRequest;
use crate::identity::parse_branch_name;
use crate::model::ProjectMetadata;

/// Capacity of one configured reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewerStatus {
    pub username: String,
    pub max_open_prs: u32,
    pub open_count: u32,
    pub open_pr_numbers: Vec<u64>,
    pub has_capacity: bool,
}

/// Outcome of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewerCapacityReport {
    /// In configuration order
    pub reviewers: Vec<ReviewerStatus>,
    pub selected_reviewer: Option<String>,
    pub all_at_capacity: bool,
}

impl std::fmt::Display for ReviewerCapacityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for status in &self.reviewers {
            let marker = if self.selected_reviewer.as_deref() == Some(status.username.as_str()) {
                "*"
            } else {
                " "
            };
            writeln!(
                f,
                "{marker} {}: {}/{} open{}",
                status.username,
                status.open_count,
                status.max_open_prs,
                if status.has_capacity { "" } else { " (at capacity)" }
            )?;
        }
        match &self.selected_reviewer {
            Some(username) => write!(f, "Selected reviewer: {username}"),
            None => write!(f, "All reviewers at capacity"),
        }
    }
}

/// Picks a reviewer for the next pull request of a project.
#[derive(Debug, Clone)]
pub struct ReviewerCapacityAssignor<'a> {
    config: &'a ProjectConfiguration,
}

impl<'a> ReviewerCapacityAssignor<'a> {
    #[must_use]
    pub fn new(config: &'a ProjectConfiguration) -> Self {
        Self { config }
    }

    /// Assign from the live open pull requests.
    ///
    /// A pull request counts for a reviewer when they are among its
    /// assignees or when its stored record names them. Pull requests of
    /// other projects are ignored.
    #[must_use]
    pub fn assign(
        &self,
        open_prs: &[OpenPullRequest],
        metadata: Option<&ProjectMetadata>,
    ) -> ReviewerCapacityReport {
        let project = self.config.project.as_str();
        let prs: Vec<(u64, BTreeSet<&str>)> = open_prs
            .iter()
            .filter(|pr| parse_branch_name(&pr.branch_name, project).is_some())
            .map(|pr| {
                let mut reviewers: BTreeSet<&str> =
                    pr.assignees.iter().map(String::as_str).collect();
                if let Some(record) = metadata.and_then(|m| m.pull_request(pr.number)) {
                    reviewers.insert(record.reviewer.as_str());
                }
                (pr.number, reviewers)
            })
            .collect();

        self.report(|reviewer| {
            prs.iter()
                .filter(|(_, reviewers)| reviewers.contains(reviewer.username.as_str()))
                .map(|(number, _)| *number)
                .collect()
        })
    }

    /// Assign from the open pull requests recorded in metadata alone.
    #[must_use]
    pub fn assign_from_metadata(&self, metadata: &ProjectMetadata) -> ReviewerCapacityReport {
        self.report(|reviewer| {
            metadata
                .open_pull_requests()
                .filter(|pr| pr.reviewer == reviewer.username)
                .map(|pr| pr.pr_number)
                .collect()
        })
    }

    fn report(&self, open_for: impl Fn(&ReviewerConfig) -> Vec<u64>) -> ReviewerCapacityReport {
        let mut selected_reviewer = None;
        let reviewers: Vec<ReviewerStatus> = self
            .config
            .reviewers
            .iter()
            .map(|reviewer| {
                let open_pr_numbers = open_for(reviewer);
                let open_count = u32::try_from(open_pr_numbers.len()).unwrap_or(u32::MAX);
                let has_capacity = open_count < reviewer.max_open_prs;
                debug!(
                    "Reviewer {}: {} open PRs (max: {})",
                    reviewer.username, open_count, reviewer.max_open_prs
                );
                if has_capacity && selected_reviewer.is_none() {
                    selected_reviewer = Some(reviewer.username.clone());
                }
                ReviewerStatus {
                    username: reviewer.username.clone(),
                    max_open_prs: reviewer.max_open_prs,
                    open_count,
                    open_pr_numbers,
                    has_capacity,
                }
            })
            .collect();

        match &selected_reviewer {
            Some(username) => info!("{}: selected reviewer {}", self.config.project, username),
            None => info!("{}: all reviewers at capacity", self.config.project),
        }

        ReviewerCapacityReport {
            all_at_capacity: selected_reviewer.is_none(),
            selected_reviewer,
            reviewers,
        }
    }
}

//! In-progress task sets and next-task selection.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::checklist::{Checklist, ChecklistItem};
use crate::hosting::OpenPullRequest;
use crate::identity::{parse_branch_name, TaskHash, TaskRef};
use crate::model::ProjectMetadata;

/// An open pull request classified by the task its branch encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub branch_name: String,
    pub task: TaskRef,
}

/// Classify live pull requests, dropping branches that are not `project`'s.
#[must_use]
pub fn classify_open_prs(project: &str, prs: &[OpenPullRequest]) -> Vec<PullRequestRef> {
    prs.iter()
        .filter_map(|pr| {
            parse_branch_name(&pr.branch_name, project).map(|task| PullRequestRef {
                number: pr.number,
                branch_name: pr.branch_name.clone(),
                task,
            })
        })
        .collect()
}

/// Classify the open pull requests recorded in metadata.
///
/// Records whose branch does not follow the naming convention fall back to
/// their stored task index.
#[must_use]
pub fn metadata_open_prs(metadata: &ProjectMetadata) -> Vec<PullRequestRef> {
    metadata
        .open_pull_requests()
        .map(|pr| PullRequestRef {
            number: pr.pr_number,
            branch_name: pr.branch_name.clone(),
            task: pr
                .task_ref(&metadata.project)
                .unwrap_or(TaskRef::ByIndex(pr.task_index)),
        })
        .collect()
}

/// Union of pull request lists, one entry per number, first source wins.
#[must_use]
pub fn merge_pr_refs(sources: &[Vec<PullRequestRef>]) -> Vec<PullRequestRef> {
    let mut merged: BTreeMap<u64, PullRequestRef> = BTreeMap::new();
    for pr in sources.iter().flatten() {
        merged.entry(pr.number).or_insert_with(|| pr.clone());
    }
    merged.into_values().collect()
}

/// Tasks with an open pull request, by index and by hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipSet {
    pub indices: BTreeSet<u32>,
    pub hashes: BTreeSet<TaskHash>,
}

impl SkipSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: TaskRef) {
        match task {
            TaskRef::ByIndex(index) => {
                self.indices.insert(index);
            }
            TaskRef::ByHash(hash) => {
                self.hashes.insert(hash);
            }
        }
    }

    #[must_use]
    pub fn from_refs(prs: &[PullRequestRef]) -> Self {
        let mut set = Self::new();
        for pr in prs {
            set.insert(pr.task.clone());
        }
        set
    }

    /// Skip set from branch names, ignoring branches of other projects.
    #[must_use]
    pub fn from_branches<'a>(project: &str, branches: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = Self::new();
        for task in branches
            .into_iter()
            .filter_map(|branch| parse_branch_name(branch, project))
        {
            set.insert(task);
        }
        set
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() && self.hashes.is_empty()
    }

    /// Whether `item` already has an open pull request.
    #[must_use]
    pub fn skips(&self, item: &ChecklistItem) -> bool {
        self.indices.contains(&item.index) || self.hashes.contains(&item.hash)
    }
}

/// The task a driver should work on next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableTask {
    pub index: u32,
    pub description: String,
    pub hash: TaskHash,
}

impl From<&ChecklistItem> for AvailableTask {
    fn from(item: &ChecklistItem) -> Self {
        Self {
            index: item.index,
            description: item.description.clone(),
            hash: item.hash.clone(),
        }
    }
}

/// First unchecked checklist item that has no open pull request.
#[must_use]
pub fn find_next_available_task(checklist: &Checklist, skip: &SkipSet) -> Option<AvailableTask> {
    for item in checklist.items().iter().filter(|item| !item.completed) {
        if skip.indices.contains(&item.index) {
            info!("Skipping task {} (open PR by index): {}", item.index, item.description);
        } else if skip.hashes.contains(&item.hash) {
            info!(
                "Skipping task {} (open PR for hash {}): {}",
                item.index, item.hash, item.description
            );
        } else {
            return Some(item.into());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::generate_task_hash;
    use crate::model::{PrState, PullRequest};
    use chrono::Utc;

    const PLAN: &str = "- [x] Done already\n- [ ] Second\n- [ ] Third\n- [ ] Fourth\n";

    #[test]
    fn test_next_task_without_skips() {
        let next = find_next_available_task(&Checklist::parse(PLAN), &SkipSet::new()).unwrap();
        assert_eq!(next.index, 2);
        assert_eq!(next.description, "Second");
    }

    #[test]
    fn test_next_task_skips_by_index_and_hash() {
        let mut skip = SkipSet::new();
        skip.insert(TaskRef::ByIndex(2));
        skip.insert(TaskRef::ByHash(generate_task_hash("Third")));
        let next = find_next_available_task(&Checklist::parse(PLAN), &skip).unwrap();
        assert_eq!(next.index, 4);
    }

    #[test]
    fn test_next_task_ignores_checked_items_in_skip_set() {
        let mut skip = SkipSet::new();
        skip.insert(TaskRef::ByIndex(1));
        let next = find_next_available_task(&Checklist::parse(PLAN), &skip).unwrap();
        assert_eq!(next.index, 2);
    }

    #[test]
    fn test_next_task_none_when_all_taken() {
        let skip = SkipSet::from_branches(
            "auth",
            ["claude-step-auth-2", "claude-step-auth-3", "claude-step-auth-4"],
        );
        assert!(find_next_available_task(&Checklist::parse(PLAN), &skip).is_none());
        let done = Checklist::parse("- [x] a\n");
        assert!(find_next_available_task(&done, &SkipSet::new()).is_none());
    }

    #[test]
    fn test_from_branches_ignores_other_projects() {
        let skip = SkipSet::from_branches(
            "auth",
            ["claude-step-billing-2", "main", "claude-step-auth-2"],
        );
        assert_eq!(skip.indices, BTreeSet::from([2]));
        assert!(skip.hashes.is_empty());
    }

    #[test]
    fn test_metadata_open_prs_fall_back_to_index() {
        let mut metadata = ProjectMetadata::create_empty("auth");
        metadata.add_pull_request(PullRequest::new(3, 10, "feature/custom", "alice", Utc::now()));
        metadata.add_pull_request(
            PullRequest::new(1, 11, "claude-step-auth-1", "bob", Utc::now())
                .with_state(PrState::Merged),
        );
        let refs = metadata_open_prs(&metadata);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].task, TaskRef::ByIndex(3));
    }

    #[test]
    fn test_merge_dedupes_by_number() {
        let hash = generate_task_hash("Second");
        let live = vec![PullRequestRef {
            number: 5,
            branch_name: format!("claude-step-auth-{hash}"),
            task: TaskRef::ByHash(hash),
        }];
        let stored = vec![
            PullRequestRef {
                number: 5,
                branch_name: "claude-step-auth-2".into(),
                task: TaskRef::ByIndex(2),
            },
            PullRequestRef {
                number: 6,
                branch_name: "claude-step-auth-3".into(),
                task: TaskRef::ByIndex(3),
            },
        ];
        let merged = merge_pr_refs(&[live, stored]);
        assert_eq!(merged.len(), 2);
        assert!(merged[0].task.is_hash_based());
    }
}

//! Pull requests whose task no longer exists, and hash-scheme migration
//! progress.

use serde::Serialize;

use super::skip::PullRequestRef;
use crate::checklist::Checklist;
use crate::identity::TaskRef;

/// Why an open pull request no longer matches the checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    /// The index is past the end of the checklist
    IndexOutOfRange,
    /// No checklist item hashes to the branch's hash
    HashNotFound,
}

impl std::fmt::Display for OrphanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfRange => f.write_str("task index no longer exists"),
            Self::HashNotFound => f.write_str("task description changed or was removed"),
        }
    }
}

/// An open pull request that no current task corresponds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedPullRequest {
    pub number: u64,
    pub branch_name: String,
    pub task: TaskRef,
    pub reason: OrphanReason,
}

/// Open pull requests that match no task of `checklist`.
///
/// Index-based references are only checked for range: a legacy index that
/// now points at a different task still counts as live.
#[must_use]
pub fn detect_orphaned_prs(
    checklist: &Checklist,
    prs: &[PullRequestRef],
) -> Vec<OrphanedPullRequest> {
    let hashes = checklist.hashes();
    prs.iter()
        .filter_map(|pr| {
            let reason = match &pr.task {
                TaskRef::ByIndex(index) if !checklist.contains_index(*index) => {
                    OrphanReason::IndexOutOfRange
                }
                TaskRef::ByHash(hash) if !hashes.contains(hash) => OrphanReason::HashNotFound,
                _ => return None,
            };
            Some(OrphanedPullRequest {
                number: pr.number,
                branch_name: pr.branch_name.clone(),
                task: pr.task.clone(),
                reason,
            })
        })
        .collect()
}

/// How far a project's open pull requests have moved to hash-based branches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub hash_based: Vec<u64>,
    pub index_based: Vec<u64>,
}

impl MigrationStatus {
    #[must_use]
    pub fn from_refs(prs: &[PullRequestRef]) -> Self {
        let mut status = Self::default();
        for pr in prs {
            if pr.task.is_hash_based() {
                status.hash_based.push(pr.number);
            } else {
                status.index_based.push(pr.number);
            }
        }
        status
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.hash_based.len() + self.index_based.len()
    }

    /// No index-based pull requests remain open.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.index_based.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{format_branch_name, generate_task_hash};

    fn pr(number: u64, task: TaskRef) -> PullRequestRef {
        PullRequestRef {
            number,
            branch_name: format_branch_name("auth", &task),
            task,
        }
    }

    #[test]
    fn test_index_out_of_range_is_orphaned() {
        let checklist = Checklist::parse("- [ ] One\n- [ ] Two\n");
        let prs = [pr(1, TaskRef::ByIndex(2)), pr(2, TaskRef::ByIndex(5))];
        let orphans = detect_orphaned_prs(&checklist, &prs);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].number, 2);
        assert_eq!(orphans[0].reason, OrphanReason::IndexOutOfRange);
    }

    #[test]
    fn test_unknown_hash_is_orphaned() {
        let checklist = Checklist::parse("- [ ] One\n- [ ] Two\n");
        let live = pr(1, TaskRef::ByHash(generate_task_hash("Two")));
        let stale = pr(2, TaskRef::ByHash(generate_task_hash("Three")));
        let orphans = detect_orphaned_prs(&checklist, &[live, stale]);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].number, 2);
        assert_eq!(orphans[0].reason, OrphanReason::HashNotFound);
    }

    #[test]
    fn test_edited_description_orphans_hash_pr() {
        let before = Checklist::parse("- [ ] Add login\n");
        let hash = before.get(1).unwrap().hash.clone();
        let after = Checklist::parse("- [ ] Add login with OAuth\n");
        let orphans = detect_orphaned_prs(&after, &[pr(9, TaskRef::ByHash(hash))]);
        assert_eq!(orphans.len(), 1);
    }

    #[test]
    fn test_migration_status() {
        let status = MigrationStatus::from_refs(&[
            pr(1, TaskRef::ByIndex(1)),
            pr(2, TaskRef::ByHash(generate_task_hash("x"))),
        ]);
        assert_eq!(status.hash_based, vec![2]);
        assert_eq!(status.index_based, vec![1]);
        assert_eq!(status.total(), 2);
        assert!(!status.is_complete());
        assert!(MigrationStatus::default().is_complete());
    }
}

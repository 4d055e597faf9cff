//! Branch naming: `claude-step-<project>-<id>`.
//!
//! `<id>` is a [`TaskRef`]: the task hash for branches created under the
//! hash scheme, the decimal checklist index for legacy branches. Project
//! names may themselves contain dashes, so the identifier is always the
//! segment after the *last* dash.

use super::TaskRef;

/// Prefix shared by every branch this tool creates.
pub const BRANCH_PREFIX: &str = "claude-step-";

/// A managed branch name split into its project and task reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub project: String,
    pub task: TaskRef,
}

/// Build the branch name for a task of `project`.
#[must_use]
pub fn format_branch_name(project: &str, task: &TaskRef) -> String {
    format!("{BRANCH_PREFIX}{project}-{task}")
}

/// Parse a branch that is expected to belong to `project`.
///
/// Returns `None` for branches of other projects and for names whose
/// identifier segment is neither a hash nor a positive index.
#[must_use]
pub fn parse_branch_name(branch: &str, project: &str) -> Option<TaskRef> {
    let rest = branch.strip_prefix(BRANCH_PREFIX)?;
    let id = rest.strip_prefix(project)?.strip_prefix('-')?;
    TaskRef::parse(id)
}

/// Parse a managed branch without knowing its project up front.
#[must_use]
pub fn parse_any_branch_name(branch: &str) -> Option<BranchRef> {
    let rest = branch.strip_prefix(BRANCH_PREFIX)?;
    let (project, id) = rest.rsplit_once('-')?;
    if project.is_empty() {
        return None;
    }
    Some(BranchRef {
        project: project.to_string(),
        task: TaskRef::parse(id)?,
    })
}

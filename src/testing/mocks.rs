//! In-memory hosting double.
//!
//! [`MockHosting`] keeps branches and files in memory and enforces the same
//! revision preconditions as the contents API, so store retry paths can be
//! exercised deterministically.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::hosting::{
    FileContent, HostingApi, HostingError, HostingResult, OpenPullRequest, TreeEntry, VersionToken,
};
use crate::identity::parse_branch_name;

#[derive(Debug, Default)]
struct MockState {
    /// branch -> head commit
    refs: BTreeMap<String, String>,
    /// (branch, path) -> content
    files: BTreeMap<(String, String), String>,
    open_prs: Vec<OpenPullRequest>,
    /// Remaining writes to reject with a conflict
    forced_conflicts: u32,
    /// path -> content another writer lands just before our next write
    racing_writes: BTreeMap<String, String>,
    /// Branches another run creates just before our next create of them
    racing_branches: BTreeSet<String>,
    api_failure: Option<String>,
    pr_listing_failure: Option<String>,
    commits: u32,
}

/// Mock implementation of [`HostingApi`].
///
/// # Example
///
/// ```rust,ignore
/// let hosting = MockHosting::new()
///     .with_file("claudestep-metadata", "projects/p1.json", "{...}")
///     .with_forced_conflicts(1);
///
/// let branch = "claudestep-metadata";
/// assert!(hosting.put_content("projects/p1.json", "{}", "msg", branch, None).is_err());
/// ```
#[derive(Debug)]
pub struct MockHosting {
    default_branch: String,
    state: Mutex<MockState>,
    put_calls: AtomicU32,
    get_calls: AtomicU32,
}

impl Default for MockHosting {
    fn default() -> Self {
        let mut state = MockState::default();
        state.refs.insert("main".to_string(), "commit-0".to_string());
        Self {
            default_branch: "main".to_string(),
            state: Mutex::new(state),
            put_calls: AtomicU32::new(0),
            get_calls: AtomicU32::new(0),
        }
    }
}

/// Revision token for `content`, as the contents API would hand out.
#[must_use]
pub fn content_version(content: &str) -> VersionToken {
    VersionToken::new(hex::encode(Sha256::digest(content.as_bytes())))
}

impl MockHosting {
    /// Repository with only a `main` branch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an (empty) branch.
    #[must_use]
    pub fn with_branch(self, branch: &str) -> Self {
        self.lock().refs.insert(branch.to_string(), format!("{branch}-head"));
        self
    }

    /// Add a file, creating its branch if needed.
    #[must_use]
    pub fn with_file(self, branch: &str, path: &str, content: &str) -> Self {
        {
            let mut state = self.lock();
            state
                .refs
                .entry(branch.to_string())
                .or_insert_with(|| format!("{branch}-head"));
            state
                .files
                .insert((branch.to_string(), path.to_string()), content.to_string());
        }
        self
    }

    /// Add an open pull request to the live listing.
    #[must_use]
    pub fn with_open_pr(self, pr: OpenPullRequest) -> Self {
        self.lock().open_prs.push(pr);
        self
    }

    /// Reject the next `count` writes with a conflict, without changing
    /// stored content.
    #[must_use]
    pub fn with_forced_conflicts(self, count: u32) -> Self {
        self.lock().forced_conflicts = count;
        self
    }

    /// Make every call fail with a transport error.
    #[must_use]
    pub fn with_api_failure(self, message: &str) -> Self {
        self.lock().api_failure = Some(message.to_string());
        self
    }

    /// Make only the pull request listing fail.
    #[must_use]
    pub fn with_pr_listing_failure(self, message: &str) -> Self {
        self.lock().pr_listing_failure = Some(message.to_string());
        self
    }

    /// Have another writer replace `path` right before our next write to it.
    pub fn race_next_write(&self, path: &str, content: &str) {
        self.lock()
            .racing_writes
            .insert(path.to_string(), content.to_string());
    }

    /// Have another run create `branch` right before our next attempt to
    /// create it.
    pub fn race_next_branch_creation(&self, branch: &str) {
        self.lock().racing_branches.insert(branch.to_string());
    }

    /// Current content of `path` on `branch`.
    #[must_use]
    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        self.lock()
            .files
            .get(&(branch.to_string(), path.to_string()))
            .cloned()
    }

    #[must_use]
    pub fn has_branch(&self, branch: &str) -> bool {
        self.lock().refs.contains_key(branch)
    }

    /// Successful writes and deletes.
    #[must_use]
    pub fn commit_count(&self) -> u32 {
        self.lock().commits
    }

    /// Write attempts, including rejected ones.
    #[must_use]
    pub fn put_count(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Content reads.
    #[must_use]
    pub fn get_count(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_failure(state: &MockState, operation: &str) -> HostingResult<()> {
        match &state.api_failure {
            Some(message) => Err(HostingError::api(operation, message.clone())),
            None => Ok(()),
        }
    }

    fn require_branch(state: &MockState, branch: &str) -> HostingResult<()> {
        if state.refs.contains_key(branch) {
            Ok(())
        } else {
            Err(HostingError::NotFound {
                what: format!("branch {branch}"),
            })
        }
    }

    fn commit(state: &mut MockState, branch: &str) {
        state.commits += 1;
        let head = format!("commit-{}", state.commits);
        state.refs.insert(branch.to_string(), head);
    }
}

impl HostingApi for MockHosting {
    fn default_branch(&self) -> HostingResult<String> {
        Self::check_failure(&self.lock(), "get repository")?;
        Ok(self.default_branch.clone())
    }

    fn get_ref(&self, branch: &str) -> HostingResult<Option<String>> {
        let state = self.lock();
        Self::check_failure(&state, "get ref")?;
        Ok(state.refs.get(branch).cloned())
    }

    fn create_ref(&self, branch: &str, sha: &str) -> HostingResult<()> {
        let mut state = self.lock();
        Self::check_failure(&state, "create ref")?;
        if state.racing_branches.remove(branch) {
            state.refs.insert(branch.to_string(), format!("{branch}-head"));
        }
        if state.refs.contains_key(branch) {
            return Err(HostingError::AlreadyExists {
                what: format!("branch {branch}"),
            });
        }
        state.refs.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    fn get_content(&self, path: &str, git_ref: &str) -> HostingResult<Option<FileContent>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        Self::check_failure(&state, "get content")?;
        Ok(state
            .files
            .get(&(git_ref.to_string(), path.to_string()))
            .map(|content| FileContent {
                content: content.clone(),
                version: content_version(content),
            }))
    }

    fn put_content(
        &self,
        path: &str,
        content: &str,
        _message: &str,
        branch: &str,
        version: Option<&VersionToken>,
    ) -> HostingResult<VersionToken> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        Self::check_failure(&state, "put content")?;
        Self::require_branch(&state, branch)?;

        let key = (branch.to_string(), path.to_string());
        if let Some(racing) = state.racing_writes.remove(path) {
            state.files.insert(key.clone(), racing);
            Self::commit(&mut state, branch);
        }

        let conflict = HostingError::Conflict {
            path: path.to_string(),
        };
        if state.forced_conflicts > 0 {
            state.forced_conflicts -= 1;
            return Err(conflict);
        }

        let current = state.files.get(&key).map(|existing| content_version(existing));
        if current.as_ref() != version {
            return Err(conflict);
        }

        state.files.insert(key, content.to_string());
        Self::commit(&mut state, branch);
        Ok(content_version(content))
    }

    fn delete_content(
        &self,
        path: &str,
        version: &VersionToken,
        branch: &str,
    ) -> HostingResult<()> {
        let mut state = self.lock();
        Self::check_failure(&state, "delete content")?;
        Self::require_branch(&state, branch)?;

        let key = (branch.to_string(), path.to_string());
        match state.files.get(&key).map(|existing| content_version(existing)) {
            None => Err(HostingError::NotFound {
                what: path.to_string(),
            }),
            Some(current) if &current != version => Err(HostingError::Conflict {
                path: path.to_string(),
            }),
            Some(_) => {
                state.files.remove(&key);
                Self::commit(&mut state, branch);
                Ok(())
            }
        }
    }

    fn list_tree(&self, branch: &str) -> HostingResult<Option<Vec<TreeEntry>>> {
        let state = self.lock();
        Self::check_failure(&state, "list tree")?;
        if !state.refs.contains_key(branch) {
            return Ok(None);
        }
        Ok(Some(
            state
                .files
                .keys()
                .filter(|(b, _)| b == branch)
                .map(|(_, path)| TreeEntry::blob(path.clone()))
                .collect(),
        ))
    }

    fn list_open_pull_requests(&self, project: &str) -> HostingResult<Vec<OpenPullRequest>> {
        let state = self.lock();
        Self::check_failure(&state, "list pull requests")?;
        if let Some(message) = &state.pr_listing_failure {
            return Err(HostingError::api("list pull requests", message.clone()));
        }
        Ok(state
            .open_prs
            .iter()
            .filter(|pr| parse_branch_name(&pr.branch_name, project).is_some())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const BRANCH: &str = "claudestep-metadata";

    #[test]
    fn test_create_requires_absent_file() {
        let hosting = MockHosting::new().with_branch(BRANCH);
        let token = hosting.put_content("a.json", "1", "m", BRANCH, None).unwrap();
        assert_eq!(token, content_version("1"));

        let err = hosting.put_content("a.json", "2", "m", BRANCH, None).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(hosting.file(BRANCH, "a.json").as_deref(), Some("1"));
    }

    #[test]
    fn test_update_requires_current_version() {
        let hosting = MockHosting::new().with_file(BRANCH, "a.json", "1");
        let stale = content_version("0");
        assert!(hosting
            .put_content("a.json", "2", "m", BRANCH, Some(&stale))
            .unwrap_err()
            .is_conflict());

        let current = content_version("1");
        hosting.put_content("a.json", "2", "m", BRANCH, Some(&current)).unwrap();
        assert_eq!(hosting.file(BRANCH, "a.json").as_deref(), Some("2"));
        assert_eq!(hosting.commit_count(), 1);
    }

    #[test]
    fn test_forced_conflicts_run_out() {
        let hosting = MockHosting::new().with_branch(BRANCH).with_forced_conflicts(1);
        assert!(hosting.put_content("a.json", "1", "m", BRANCH, None).is_err());
        assert!(hosting.put_content("a.json", "1", "m", BRANCH, None).is_ok());
        assert_eq!(hosting.put_count(), 2);
    }

    #[test]
    fn test_racing_write_makes_token_stale() {
        let hosting = MockHosting::new().with_file(BRANCH, "a.json", "1");
        hosting.race_next_write("a.json", "theirs");
        let err = hosting
            .put_content("a.json", "ours", "m", BRANCH, Some(&content_version("1")))
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(hosting.file(BRANCH, "a.json").as_deref(), Some("theirs"));
    }

    #[test]
    fn test_write_to_missing_branch() {
        let hosting = MockHosting::new();
        let err = hosting.put_content("a.json", "1", "m", BRANCH, None).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(hosting.list_tree(BRANCH).unwrap(), None);
    }

    #[test]
    fn test_open_prs_filtered_by_project() {
        let hosting = MockHosting::new()
            .with_open_pr(OpenPullRequest::new(1, "claude-step-auth-1", Utc::now()))
            .with_open_pr(OpenPullRequest::new(2, "claude-step-billing-1", Utc::now()));
        let prs = hosting.list_open_pull_requests("auth").unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].number, 1);
    }

    #[test]
    fn test_create_existing_ref() {
        let hosting = MockHosting::new();
        assert!(hosting.create_ref("main", "abc").unwrap_err().is_already_exists());

        hosting.race_next_branch_creation(BRANCH);
        assert!(hosting.create_ref(BRANCH, "abc").unwrap_err().is_already_exists());
        assert!(hosting.has_branch(BRANCH));
    }

    #[test]
    fn test_api_failure() {
        let hosting = MockHosting::new().with_api_failure("connection reset");
        assert!(matches!(hosting.get_ref("main"), Err(HostingError::Api { .. })));
    }
}

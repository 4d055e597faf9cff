//! Per-project configuration (`claude-step/<project>/configuration.yml`).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Result, StepError};
use crate::hosting::HostingApi;

/// Directory holding one sub-directory per project.
pub const PROJECTS_DIR: &str = "claude-step";

/// A reviewer and the number of open pull requests they accept at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerConfig {
    pub username: String,
    #[serde(rename = "maxOpenPRs", default = "default_max_open_prs")]
    pub max_open_prs: u32,
}

fn default_max_open_prs() -> u32 {
    1
}

impl ReviewerConfig {
    pub fn new(username: impl Into<String>, max_open_prs: u32) -> Self {
        Self {
            username: username.into(),
            max_open_prs,
        }
    }
}

#[derive(Deserialize)]
struct RawProjectConfiguration {
    reviewers: Option<Vec<ReviewerConfig>>,
    #[serde(rename = "baseBranch")]
    base_branch: Option<String>,
}

/// Parsed `configuration.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectConfiguration {
    pub project: String,
    /// In declaration order, which is assignment priority
    pub reviewers: Vec<ReviewerConfig>,
    #[serde(rename = "baseBranch", skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
}

impl ProjectConfiguration {
    pub fn new(project: impl Into<String>, reviewers: Vec<ReviewerConfig>) -> Self {
        Self {
            project: project.into(),
            reviewers,
            base_branch: None,
        }
    }

    /// Parse and validate YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Config`] for YAML errors and
    /// [`StepError::InvalidConfig`] for missing or inconsistent reviewers.
    pub fn from_yaml(project: &str, text: &str) -> Result<Self> {
        let raw: RawProjectConfiguration = serde_yaml::from_str(text)
            .map_err(|e| StepError::config(format!("{project}: invalid configuration.yml: {e}")))?;
        let reviewers = raw.reviewers.ok_or_else(|| {
            StepError::invalid_config("reviewers", "Missing required field: reviewers")
        })?;

        let config = Self {
            project: project.to_string(),
            reviewers,
            base_branch: raw.base_branch.filter(|b| !b.trim().is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read `configuration.yml` from a checkout.
    pub fn load(paths: &ProjectPaths) -> Result<Self> {
        let path = paths.configuration_file();
        let text = std::fs::read_to_string(&path).map_err(|e| {
            StepError::config_with_path(
                format!("cannot read {}: {e}", path.display()),
                path.clone(),
            )
        })?;
        Self::from_yaml(&paths.project, &text)
    }

    /// Like [`Self::load`], but `None` when the project has no
    /// `configuration.yml`.
    pub fn load_if_present(paths: &ProjectPaths) -> Result<Option<Self>> {
        if !paths.configuration_file().exists() {
            return Ok(None);
        }
        Self::load(paths).map(Some)
    }

    /// Read `configuration.yml` from `git_ref`.
    pub fn from_branch(
        hosting: &impl HostingApi,
        paths: &ProjectPaths,
        git_ref: &str,
    ) -> Result<Self> {
        let path = paths.configuration_path();
        match hosting.get_content(&path, git_ref) {
            Ok(Some(file)) => Self::from_yaml(&paths.project, &file.content),
            Ok(None) => Err(StepError::config(format!("{path} not found on {git_ref}"))),
            Err(e) => Err(StepError::hosting(&paths.project, "read configuration", e)),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.reviewers.is_empty() {
            return Err(StepError::invalid_config("reviewers", "at least one reviewer is required"));
        }
        let mut seen = HashSet::new();
        for reviewer in &self.reviewers {
            if reviewer.username.trim().is_empty() {
                return Err(StepError::invalid_config("reviewers.username", "must not be empty"));
            }
            if !seen.insert(reviewer.username.as_str()) {
                return Err(StepError::invalid_config(
                    "reviewers.username",
                    format!("duplicate reviewer '{}'", reviewer.username),
                ));
            }
        }
        Ok(())
    }

    /// Base branch for this project, falling back to `default`.
    #[must_use]
    pub fn base_branch_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_branch.as_deref().unwrap_or(default)
    }

    #[must_use]
    pub fn reviewer(&self, username: &str) -> Option<&ReviewerConfig> {
        self.reviewers.iter().find(|r| r.username == username)
    }
}

/// File locations of one project inside the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub project: String,
    root: PathBuf,
}

impl ProjectPaths {
    /// Paths for `project` in the checkout at `repo_root`.
    pub fn new(repo_root: &Path, project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            root: repo_root.to_path_buf(),
        }
    }

    /// Repository-relative directory, as used against the hosting API.
    #[must_use]
    pub fn dir_path(&self) -> String {
        format!("{PROJECTS_DIR}/{}", self.project)
    }

    #[must_use]
    pub fn configuration_path(&self) -> String {
        format!("{}/configuration.yml", self.dir_path())
    }

    #[must_use]
    pub fn spec_path(&self) -> String {
        format!("{}/spec.md", self.dir_path())
    }

    /// Name of the project's document on the metadata branch.
    #[must_use]
    pub fn metadata_file_name(&self) -> String {
        format!("{}.json", self.project)
    }

    #[must_use]
    pub fn configuration_file(&self) -> PathBuf {
        self.root.join(self.configuration_path())
    }

    #[must_use]
    pub fn spec_file(&self) -> PathBuf {
        self.root.join(self.spec_path())
    }

    /// Project name from a path such as `claude-step/auth/spec.md`.
    #[must_use]
    pub fn project_from_path(path: &str) -> Option<String> {
        let rest = path.strip_prefix(PROJECTS_DIR)?.strip_prefix('/')?;
        let (project, _) = rest.split_once('/')?;
        (!project.is_empty()).then(|| project.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reviewers_in_order() {
        let text = "reviewers:\n  - username: alice\n    maxOpenPRs: 2\n\
                    \x20 - username: bob\n    maxOpenPRs: 1\nbaseBranch: develop\n";
        let config = ProjectConfiguration::from_yaml("auth", text).unwrap();
        assert_eq!(
            config.reviewers,
            vec![ReviewerConfig::new("alice", 2), ReviewerConfig::new("bob", 1)]
        );
        assert_eq!(config.base_branch_or("main"), "develop");
    }

    #[test]
    fn test_max_open_prs_defaults_to_one() {
        let config =
            ProjectConfiguration::from_yaml("auth", "reviewers:\n  - username: alice\n").unwrap();
        assert_eq!(config.reviewers[0].max_open_prs, 1);
        assert_eq!(config.base_branch_or("main"), "main");
    }

    #[test]
    fn test_missing_reviewers() {
        let err = ProjectConfiguration::from_yaml("auth", "baseBranch: main\n").unwrap_err();
        assert!(err.to_string().contains("Missing required field: reviewers"));
    }

    #[test]
    fn test_rejects_duplicate_and_empty_usernames() {
        let dup = "reviewers:\n  - username: alice\n  - username: alice\n";
        assert!(matches!(
            ProjectConfiguration::from_yaml("auth", dup).unwrap_err(),
            StepError::InvalidConfig { .. }
        ));
        assert!(ProjectConfiguration::from_yaml("auth", "reviewers: []\n").is_err());
        assert!(ProjectConfiguration::from_yaml("auth", "reviewers:\n  - username: ''\n").is_err());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = ProjectConfiguration::from_yaml("auth", "reviewers: [").unwrap_err();
        assert!(matches!(err, StepError::Config { .. }));
    }

    #[test]
    fn test_paths() {
        let paths = ProjectPaths::new(Path::new("/repo"), "auth");
        assert_eq!(paths.spec_path(), "claude-step/auth/spec.md");
        assert_eq!(
            paths.configuration_file(),
            PathBuf::from("/repo/claude-step/auth/configuration.yml")
        );
        assert_eq!(paths.metadata_file_name(), "auth.json");
    }

    #[test]
    fn test_project_from_path() {
        assert_eq!(
            ProjectPaths::project_from_path("claude-step/auth/spec.md").as_deref(),
            Some("auth")
        );
        assert_eq!(ProjectPaths::project_from_path("docs/auth/spec.md"), None);
        assert_eq!(ProjectPaths::project_from_path("claude-step/spec.md"), None);
    }

    #[test]
    fn test_from_branch() {
        use crate::testing::{sample_configuration, MockHosting};

        let paths = ProjectPaths::new(Path::new("."), "auth");
        let text = "reviewers:\n  - username: alice\n    maxOpenPRs: 1\n\
                    \x20 - username: bob\n    maxOpenPRs: 2\n";
        let hosting = MockHosting::new().with_file("main", &paths.configuration_path(), text);
        let config = ProjectConfiguration::from_branch(&hosting, &paths, "main").unwrap();
        assert_eq!(config, sample_configuration());
        assert_eq!(config.reviewer("bob").map(|r| r.max_open_prs), Some(2));

        let err = ProjectConfiguration::from_branch(&hosting, &paths, "develop").unwrap_err();
        assert!(matches!(err, StepError::Config { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path(), "auth");
        assert!(ProjectConfiguration::load_if_present(&paths).unwrap().is_none());

        std::fs::create_dir_all(paths.configuration_file().parent().unwrap()).unwrap();
        std::fs::write(
            paths.configuration_file(),
            "reviewers:\n  - username: alice\n    maxOpenPRs: 3\n",
        )
        .unwrap();
        assert_eq!(ProjectConfiguration::load(&paths).unwrap().reviewers[0].max_open_prs, 3);
        assert!(ProjectConfiguration::load_if_present(&paths).unwrap().is_some());
    }
}

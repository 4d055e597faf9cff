//! Configuration for the ClaudeStep drivers.
//!
//! Two layers:
//! - [`Settings`]: how to reach the metadata store and the hosting API,
//!   read from `claudestep.toml` (missing file = defaults)
//! - [`ProjectConfiguration`]: per-project reviewers, read from
//!   `claude-step/<project>/configuration.yml`
//!
//! # Example
//!
//! ```toml
//! [store]
//! repo = "acme/widgets"
//! branch = "claudestep-metadata"
//! max_retries = 5
//!
//! [github]
//! label = "claudestep"
//! ```

pub mod project;

pub use project::{ProjectConfiguration, ProjectPaths, ReviewerConfig, PROJECTS_DIR};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StepError};
use crate::store::retry::{DEFAULT_MAX_RETRIES, RETRY_BACKOFF_BASE_MS};
use crate::store::{RetryPolicy, DEFAULT_BASE_PATH};

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = "claudestep.toml";

/// Default metadata branch.
pub const DEFAULT_METADATA_BRANCH: &str = "claudestep-metadata";

/// Default label put on every pull request the tool opens.
pub const DEFAULT_LABEL: &str = "claudestep";

/// Default base branch for task pull requests.
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// `owner/name`; usually supplied by `GITHUB_REPOSITORY`
    pub repo: Option<String>,
    pub branch: String,
    pub base_path: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            repo: None,
            branch: DEFAULT_METADATA_BRANCH.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: RETRY_BACKOFF_BASE_MS,
        }
    }
}

impl StoreSettings {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay_ms)
    }
}

/// `[github]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    pub label: String,
    pub base_branch: String,
    pub gh_binary: Option<String>,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            base_branch: DEFAULT_BASE_BRANCH.to_string(),
            gh_binary: None,
        }
    }
}

/// Contents of `claudestep.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub github: GithubSettings,
}

impl Settings {
    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Config`] for TOML errors and
    /// [`StepError::InvalidConfig`] for out-of-range values.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(text).map_err(|e| StepError::config(format!("invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load `path`, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            StepError::config_with_path(
                format!("cannot read {}: {e}", path.display()),
                path.to_path_buf(),
            )
        })?;
        Self::from_toml(&text).map_err(|e| match e {
            StepError::Config { message, .. } => StepError::config_with_path(
                format!("{}: {message}", path.display()),
                path.to_path_buf(),
            ),
            other => other,
        })
    }

    /// Default settings path in `dir`.
    #[must_use]
    pub fn default_path(dir: &Path) -> PathBuf {
        dir.join(SETTINGS_FILE)
    }

    /// Override values given on the command line or in the environment.
    #[must_use]
    pub fn with_overrides(mut self, repo: Option<String>, branch: Option<String>) -> Self {
        if let Some(repo) = repo.filter(|r| !r.is_empty()) {
            self.store.repo = Some(repo);
        }
        if let Some(branch) = branch.filter(|b| !b.is_empty()) {
            self.store.branch = branch;
        }
        self
    }

    /// Repository to operate on.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidConfig`] if none was configured.
    pub fn repo(&self) -> Result<&str> {
        self.store.repo.as_deref().ok_or_else(|| {
            StepError::invalid_config(
                "store.repo",
                "no repository configured (set GITHUB_REPOSITORY)",
            )
        })
    }

    /// Base branch for a project's pull requests: its `baseBranch` when
    /// set, otherwise `[github] base_branch`.
    #[must_use]
    pub fn base_branch_for<'a>(&'a self, project: Option<&'a ProjectConfiguration>) -> &'a str {
        let default = self.github.base_branch.as_str();
        project.map_or(default, |config| config.base_branch_or(default))
    }

    fn validate(&self) -> Result<()> {
        if self.store.branch.trim().is_empty() {
            return Err(StepError::invalid_config("store.branch", "must not be empty"));
        }
        if self.store.base_path.trim_matches('/').is_empty() {
            return Err(StepError::invalid_config("store.base_path", "must not be empty"));
        }
        if let Some(repo) = &self.store.repo {
            if repo.split('/').filter(|part| !part.is_empty()).count() != 2 {
                return Err(StepError::invalid_config(
                    "store.repo",
                    format!("'{repo}' is not of the form owner/name"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.store.branch, DEFAULT_METADATA_BRANCH);
        assert_eq!(settings.github.label, DEFAULT_LABEL);
        assert_eq!(settings.store.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_settings() {
        let text = "[store]\nrepo = \"acme/widgets\"\nmax_retries = 5\n\n\
                    [github]\ngh_binary = \"/opt/gh\"\n";
        let settings = Settings::from_toml(text).unwrap();
        assert_eq!(settings.repo().unwrap(), "acme/widgets");
        assert_eq!(settings.store.max_retries, 5);
        assert_eq!(settings.store.base_path, "projects");
        assert_eq!(settings.github.gh_binary.as_deref(), Some("/opt/gh"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Settings::from_toml("[store]\nrepo = \"widgets\"\n").unwrap_err(),
            StepError::InvalidConfig { .. }
        ));
        assert!(Settings::from_toml("[store]\nbranch = \"\"\n").is_err());
        assert!(matches!(
            Settings::from_toml("[store\n").unwrap_err(),
            StepError::Config { .. }
        ));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::default().with_overrides(Some("o/r".into()), Some(String::new()));
        assert_eq!(settings.repo().unwrap(), "o/r");
        assert_eq!(settings.store.branch, DEFAULT_METADATA_BRANCH);
        assert!(Settings::default().repo().is_err());
    }

    #[test]
    fn test_base_branch_resolution() {
        let settings = Settings::from_toml("[github]\nbase_branch = \"trunk\"\n").unwrap();
        assert_eq!(settings.base_branch_for(None), "trunk");

        let config = ProjectConfiguration::from_yaml(
            "auth",
            "reviewers:\n  - username: alice\nbaseBranch: develop\n",
        )
        .unwrap();
        assert_eq!(settings.base_branch_for(Some(&config)), "develop");

        let config = ProjectConfiguration::new("auth", vec![ReviewerConfig::new("alice", 1)]);
        assert_eq!(settings.base_branch_for(Some(&config)), "trunk");
        assert_eq!(Settings::default().base_branch_for(None), DEFAULT_BASE_BRANCH);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&Settings::default_path(dir.path())).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = Settings::default_path(dir.path());
        std::fs::write(&path, "not = [valid").unwrap();
        match Settings::load(&path).unwrap_err() {
            StepError::Config { path: Some(p), .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}

//! [`HostingApi`] backed by the GitHub CLI.
//!
//! REST calls go through `gh api` and pull request listings through
//! `gh pr list --json`, so authentication is whatever `gh` is configured
//! with (`GH_TOKEN` in CI).

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

use super::{
    FileContent, HostingApi, HostingError, HostingResult, OpenPullRequest, TreeEntry, VersionToken,
};
use crate::identity::parse_branch_name;
use crate::model::PrState;

/// Upper bound on pull requests fetched per listing.
pub const PR_LIST_LIMIT: usize = 100;

/// GitHub access through the `gh` command line client.
#[derive(Debug, Clone)]
pub struct GhCli {
    repo: String,
    label: Option<String>,
    binary: PathBuf,
}

impl GhCli {
    /// Client for `owner/name`, running `gh` from `PATH`.
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            label: None,
            binary: PathBuf::from("gh"),
        }
    }

    /// Resolve the `gh` binary up front so a missing install fails early.
    ///
    /// # Errors
    ///
    /// Returns an error if `binary` cannot be found on `PATH`.
    pub fn locate(repo: impl Into<String>, binary: &str) -> HostingResult<Self> {
        let path = which::which(binary)
            .map_err(|e| HostingError::api("locate gh", format!("{binary}: {e}")))?;
        Ok(Self::new(repo).with_binary(path))
    }

    /// Only list pull requests carrying this label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = (!label.is_empty()).then_some(label);
        self
    }

    /// Use an explicit `gh` binary.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn run(&self, operation: &str, args: &[String], input: Option<&str>) -> HostingResult<String> {
        debug!("gh {}", args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| HostingError::api(operation, format!("failed to run gh: {e}")))?;

        if let (Some(body), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(body.as_bytes()).map_err(|e| {
                HostingError::api(operation, format!("failed to write request: {e}"))
            })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| HostingError::api(operation, format!("gh did not finish: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            Err(classify_failure(operation, &format!("{stderr}{stdout}")))
        }
    }

    fn api(
        &self,
        operation: &str,
        method: &str,
        endpoint: &str,
        body: Option<&Value>,
    ) -> HostingResult<Value> {
        let mut args = vec![
            "api".to_string(),
            "--method".to_string(),
            method.to_string(),
            endpoint.to_string(),
        ];
        let input = body.map(Value::to_string);
        if input.is_some() {
            args.push("--input".to_string());
            args.push("-".to_string());
        }

        let stdout = self.run(operation, &args, input.as_deref())?;
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout)
            .map_err(|e| HostingError::api(operation, format!("unexpected response: {e}")))
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("repos/{}/{}", self.repo, suffix)
    }
}

/// Map `gh` failure output onto a [`HostingError`].
///
/// `gh api` reports the HTTP status as `(HTTP 404)` at the end of its
/// message. GitHub answers a stale or missing blob sha with 409, or with
/// 422 naming the sha. Creating a ref that exists is a 422 as well.
pub(crate) fn classify_failure(operation: &str, output: &str) -> HostingError {
    match http_status(output) {
        Some(404) => HostingError::NotFound {
            what: operation.to_string(),
        },
        Some(422) if output.contains("Reference already exists") => HostingError::AlreadyExists {
            what: operation.to_string(),
        },
        Some(409) => HostingError::Conflict {
            path: operation.to_string(),
        },
        Some(422) if output.contains("sha") => HostingError::Conflict {
            path: operation.to_string(),
        },
        _ => HostingError::api(operation, output.trim()),
    }
}

fn http_status(output: &str) -> Option<u16> {
    let start = output.rfind("(HTTP ")? + "(HTTP ".len();
    output.get(start..start + 3)?.parse().ok()
}

fn missing_field(operation: &str, field: &str) -> HostingError {
    HostingError::api(operation, format!("response has no {field}"))
}

/// Decode a contents API body, which is base64 wrapped at 60 columns.
pub(crate) fn decode_content(operation: &str, encoded: &str) -> HostingResult<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| HostingError::api(operation, format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| HostingError::api(operation, format!("content is not UTF-8: {e}")))
}

#[derive(Debug, Deserialize)]
struct GhAssignee {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPullRequest {
    number: u64,
    head_ref_name: String,
    state: String,
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    assignees: Vec<GhAssignee>,
}

/// Parse `gh pr list --json` output, keeping only `project`'s branches.
///
/// A listing that fills [`PR_LIST_LIMIT`] may be cut short, which is logged.
pub(crate) fn parse_pr_list(project: &str, stdout: &str) -> HostingResult<Vec<OpenPullRequest>> {
    let listed: Vec<GhPullRequest> = serde_json::from_str(stdout).map_err(|e| {
        HostingError::api("list pull requests", format!("unexpected response: {e}"))
    })?;
    if is_truncated(listed.len()) {
        warn!(
            "Pull request listing hit the limit of {} entries; {} may have more open pull requests",
            PR_LIST_LIMIT, project
        );
    }

    Ok(listed
        .into_iter()
        .filter(|pr| parse_branch_name(&pr.head_ref_name, project).is_some())
        .map(|pr| OpenPullRequest {
            number: pr.number,
            branch_name: pr.head_ref_name,
            state: PrState::parse(&pr.state).unwrap_or(PrState::Open),
            created_at: pr.created_at,
            title: pr.title,
            assignees: pr.assignees.into_iter().map(|a| a.login).collect(),
        })
        .collect())
}

/// Whether a listing of `count` entries hit [`PR_LIST_LIMIT`].
pub(crate) fn is_truncated(count: usize) -> bool {
    count >= PR_LIST_LIMIT
}

impl HostingApi for GhCli {
    fn default_branch(&self) -> HostingResult<String> {
        let op = "get repository";
        let repo = self.api(op, "GET", &format!("repos/{}", self.repo), None)?;
        repo["default_branch"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| missing_field(op, "default_branch"))
    }

    fn get_ref(&self, branch: &str) -> HostingResult<Option<String>> {
        let op = "get ref";
        match self.api(op, "GET", &self.endpoint(&format!("git/ref/heads/{branch}")), None) {
            Ok(reference) => reference["object"]["sha"]
                .as_str()
                .map(|sha| Some(sha.to_string()))
                .ok_or_else(|| missing_field(op, "object.sha")),
            Err(HostingError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_ref(&self, branch: &str, sha: &str) -> HostingResult<()> {
        let body = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        self.api("create ref", "POST", &self.endpoint("git/refs"), Some(&body))?;
        Ok(())
    }

    fn get_content(&self, path: &str, git_ref: &str) -> HostingResult<Option<FileContent>> {
        let op = "get content";
        let endpoint = self.endpoint(&format!("contents/{path}?ref={git_ref}"));
        let file = match self.api(op, "GET", &endpoint, None) {
            Ok(file) => file,
            Err(HostingError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let encoded = file["content"]
            .as_str()
            .ok_or_else(|| missing_field(op, "content"))?;
        let sha = file["sha"].as_str().ok_or_else(|| missing_field(op, "sha"))?;
        Ok(Some(FileContent {
            content: decode_content(op, encoded)?,
            version: VersionToken::new(sha),
        }))
    }

    fn put_content(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
        version: Option<&VersionToken>,
    ) -> HostingResult<VersionToken> {
        let op = "put content";
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "branch": branch,
        });
        if let Some(version) = version {
            body["sha"] = Value::String(version.as_str().to_string());
        }

        let written = self
            .api(op, "PUT", &self.endpoint(&format!("contents/{path}")), Some(&body))
            .map_err(|e| match e {
                HostingError::Conflict { .. } => HostingError::Conflict {
                    path: path.to_string(),
                },
                // A conditional write to a file that was deleted meanwhile
                HostingError::NotFound { .. } if version.is_some() => HostingError::Conflict {
                    path: path.to_string(),
                },
                other => other,
            })?;
        written["content"]["sha"]
            .as_str()
            .map(VersionToken::new)
            .ok_or_else(|| missing_field(op, "content.sha"))
    }

    fn delete_content(
        &self,
        path: &str,
        version: &VersionToken,
        branch: &str,
    ) -> HostingResult<()> {
        let body = json!({
            "message": format!("Delete {path}"),
            "sha": version.as_str(),
            "branch": branch,
        });
        let endpoint = self.endpoint(&format!("contents/{path}"));
        self.api("delete content", "DELETE", &endpoint, Some(&body))
            .map_err(|e| match e {
                HostingError::Conflict { .. } => HostingError::Conflict {
                    path: path.to_string(),
                },
                other => other,
            })?;
        Ok(())
    }

    fn list_tree(&self, branch: &str) -> HostingResult<Option<Vec<TreeEntry>>> {
        let op = "list tree";
        let endpoint = self.endpoint(&format!("git/trees/{branch}?recursive=1"));
        let mut tree = match self.api(op, "GET", &endpoint, None) {
            Ok(tree) => tree,
            Err(HostingError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let entries = serde_json::from_value(tree["tree"].take())
            .map_err(|e| HostingError::api(op, format!("unexpected tree listing: {e}")))?;
        Ok(Some(entries))
    }

    fn list_open_pull_requests(&self, project: &str) -> HostingResult<Vec<OpenPullRequest>> {
        let mut args: Vec<String> = [
            "pr",
            "list",
            "--repo",
            self.repo.as_str(),
            "--state",
            "open",
            "--limit",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
        args.push(PR_LIST_LIMIT.to_string());
        if let Some(label) = &self.label {
            args.push("--label".to_string());
            args.push(label.clone());
        }
        args.push("--json".to_string());
        args.push("number,headRefName,state,createdAt,title,assignees".to_string());

        let stdout = self.run("list pull requests", &args, None)?;
        parse_pr_list(project, &stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify_failure("get content", "gh: Not Found (HTTP 404)\n");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_classify_conflicts() {
        let stale = "gh: is at 1a2b but expected 3c4d (HTTP 409)";
        assert!(classify_failure("put", stale).is_conflict());
        let missing_sha = "gh: Invalid request.\n\n\"sha\" wasn't supplied. (HTTP 422)";
        assert!(classify_failure("put", missing_sha).is_conflict());
    }

    #[test]
    fn test_classify_existing_ref() {
        let err = classify_failure("create ref", "gh: Reference already exists (HTTP 422)\n");
        assert!(err.is_already_exists());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_classify_other_failures() {
        let err = classify_failure("put", "gh: Validation Failed (HTTP 422)");
        assert!(matches!(err, HostingError::Api { .. }));
        let err = classify_failure("get", "error connecting to api.github.com");
        assert!(
            matches!(err, HostingError::Api { ref message, .. } if message.contains("connecting"))
        );
    }

    #[test]
    fn test_decode_wrapped_content() {
        let encoded = "eyJwcm9qZWN0Ijog\nInAxIn0=\n";
        assert_eq!(decode_content("get", encoded).unwrap(), r#"{"project": "p1"}"#);
        assert!(decode_content("get", "!!!").is_err());
    }

    #[test]
    fn test_parse_pr_list_filters_by_project() {
        let stdout = r#"[
            {"number": 7, "headRefName": "claude-step-auth-a3f2b891", "state": "OPEN",
             "createdAt": "2025-01-10T12:00:00Z", "title": "Add login",
             "assignees": [{"login": "alice"}]},
            {"number": 8, "headRefName": "claude-step-billing-2", "state": "OPEN",
             "createdAt": "2025-01-11T12:00:00Z", "title": "Invoices", "assignees": []},
            {"number": 9, "headRefName": "feature/unrelated", "state": "OPEN",
             "createdAt": "2025-01-12T12:00:00Z", "title": "Other", "assignees": []}
        ]"#;
        let prs = parse_pr_list("auth", stdout).unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].number, 7);
        assert_eq!(prs[0].state, PrState::Open);
        assert_eq!(prs[0].assignees, vec!["alice".to_string()]);
    }

    #[test]
    fn test_listing_at_limit_is_truncated() {
        assert!(!is_truncated(PR_LIST_LIMIT - 1));
        assert!(is_truncated(PR_LIST_LIMIT));

        let entries: Vec<String> = (1..=PR_LIST_LIMIT)
            .map(|n| {
                format!(
                    r#"{{"number": {n}, "headRefName": "claude-step-auth-{n}", "state": "OPEN",
                        "createdAt": "2025-01-10T12:00:00Z"}}"#
                )
            })
            .collect();
        let prs = parse_pr_list("auth", &format!("[{}]", entries.join(","))).unwrap();
        assert_eq!(prs.len(), PR_LIST_LIMIT);
    }

    #[test]
    fn test_with_label_ignores_empty() {
        assert!(GhCli::new("o/r").with_label("").label.is_none());
        assert_eq!(
            GhCli::new("o/r").with_label("claudestep").label.as_deref(),
            Some("claudestep")
        );
    }
}

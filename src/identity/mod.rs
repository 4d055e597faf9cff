//! Content-derived task identity.
//!
//! A task's position in the checklist shifts whenever someone inserts or
//! reorders lines; its description does not. The task hash is the first
//! eight hex characters of the SHA-256 of the normalized description, and it
//! is what new-era branch names embed.
//!
//! # Example
//!
//! ```
//! use claudestep::identity::{generate_task_hash, normalize_description};
//!
//! assert_eq!(normalize_description("  Add   user\tauth "), "Add user auth");
//! assert_eq!(
//!     generate_task_hash("Add user auth"),
//!     generate_task_hash("  Add   user\tauth "),
//! );
//! assert_eq!(generate_task_hash("").as_str(), "e3b0c442");
//! ```

pub mod branch;

pub use branch::{
    format_branch_name, parse_any_branch_name, parse_branch_name, BranchRef, BRANCH_PREFIX,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
pub const TASK_HASH_LEN: usize = 8;

/// Trim and collapse internal whitespace runs to a single space.
#[must_use]
pub fn normalize_description(description: &str) -> String {
    description.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive the stable identifier for a task description.
#[must_use]
pub fn generate_task_hash(description: &str) -> TaskHash {
    let digest = Sha256::digest(normalize_description(description).as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(TASK_HASH_LEN);
    TaskHash(hex)
}

/// Generate a sanitized slug from a task description.
///
/// Lowercases, replaces every run of non-alphanumeric characters with a
/// single dash, and truncates to `max_length` without a trailing dash.
#[must_use]
pub fn generate_task_id(description: &str, max_length: usize) -> String {
    let mut slug = String::with_capacity(description.len());
    let mut pending_dash = false;
    for c in description.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(max_length);
    slug.trim_end_matches('-').to_string()
}

/// Eight lowercase hex characters identifying a task description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskHash(String);

impl TaskHash {
    /// Accept `value` if it has the hash shape (8 lowercase hex characters).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let shaped = value.len() == TASK_HASH_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        shaped.then(|| Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..6).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for TaskHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TaskHash {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("'{value}' is not an 8-character task hash"))
    }
}

impl From<TaskHash> for String {
    fn from(hash: TaskHash) -> Self {
        hash.0
    }
}

/// How a pull request names the task it works on.
///
/// Legacy branches embed the 1-based checklist position; current branches
/// embed the content hash. Which era a branch belongs to is decided once,
/// when its name is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskRef {
    ByIndex(u32),
    ByHash(TaskHash),
}

impl TaskRef {
    /// Parse the identifier segment of a branch name.
    ///
    /// Hash shape wins over decimal, so `12345678` is a hash.
    #[must_use]
    pub fn parse(segment: &str) -> Option<Self> {
        if let Some(hash) = TaskHash::parse(segment) {
            return Some(Self::ByHash(hash));
        }
        if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        match segment.parse::<u32>() {
            Ok(index) if index > 0 => Some(Self::ByIndex(index)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_hash_based(&self) -> bool {
        matches!(self, Self::ByHash(_))
    }
}

impl std::fmt::Display for TaskRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByIndex(index) => write!(f, "{index}"),
            Self::ByHash(hash) => write!(f, "{hash}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Hashing
    // =========================================================================

    #[test]
    fn test_hash_is_eight_lowercase_hex() {
        let hash = generate_task_hash("Add user authentication");
        assert_eq!(hash.as_str().len(), 8);
        assert!(TaskHash::parse(hash.as_str()).is_some());
    }

    #[test]
    fn test_hash_ignores_surrounding_and_repeated_whitespace() {
        let base = generate_task_hash("Add user authentication");
        assert_eq!(base, generate_task_hash("  Add user authentication  "));
        assert_eq!(base, generate_task_hash("Add  user\n\tauthentication"));
    }

    #[test]
    fn test_hash_changes_with_description() {
        assert_ne!(
            generate_task_hash("Add user authentication"),
            generate_task_hash("Add user authorization")
        );
    }

    #[test]
    fn test_hash_of_empty_description() {
        assert_eq!(generate_task_hash("   ").as_str(), "e3b0c442");
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(generate_task_hash("").short(), "e3b0c4");
    }

    // =========================================================================
    // Task ids
    // =========================================================================

    #[test]
    fn test_generate_task_id() {
        assert_eq!(generate_task_id("Add User Auth!", 30), "add-user-auth");
        assert_eq!(generate_task_id("--Leading & trailing--", 30), "leading-trailing");
    }

    #[test]
    fn test_generate_task_id_truncates_without_trailing_dash() {
        assert_eq!(generate_task_id("abcde fghij", 6), "abcde");
    }

    // =========================================================================
    // TaskRef
    // =========================================================================

    #[test]
    fn test_task_ref_parses_both_eras() {
        assert_eq!(TaskRef::parse("3"), Some(TaskRef::ByIndex(3)));
        assert_eq!(
            TaskRef::parse("a1b2c3d4"),
            Some(TaskRef::ByHash(TaskHash("a1b2c3d4".into())))
        );
    }

    #[test]
    fn test_task_ref_eight_digits_is_hash() {
        assert!(TaskRef::parse("12345678").is_some_and(|r| r.is_hash_based()));
    }

    #[test]
    fn test_task_ref_rejects_garbage() {
        assert_eq!(TaskRef::parse(""), None);
        assert_eq!(TaskRef::parse("0"), None);
        assert_eq!(TaskRef::parse("abc"), None);
        assert_eq!(TaskRef::parse("A1B2C3D4"), None);
        assert_eq!(TaskRef::parse("+5"), None);
    }

    #[test]
    fn test_task_hash_deserialize_rejects_bad_shape() {
        let bad: std::result::Result<TaskHash, _> = serde_json::from_str("\"xyz\"");
        assert!(bad.is_err());
        let good: TaskHash = serde_json::from_str("\"0badc0de\"").unwrap();
        assert_eq!(good.as_str(), "0badc0de");
    }
}

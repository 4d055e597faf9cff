//! The project's task checklist (`spec.md`).
//!
//! Tasks are markdown checkbox lines (`- [ ]` / `- [x]`). Their positions
//! give the 1-based task index; their normalized descriptions give the
//! content hash. Nested checkboxes are tasks too. `*` bullets are prose.
//!
//! # Example
//!
//! ```rust
//! use claudestep::checklist::Checklist;
//!
//! let checklist = Checklist::parse("# Plan\n- [x] Write schema\n- [ ] Add store\n");
//! let next = checklist.first_unchecked().unwrap();
//! assert_eq!(next.index, 2);
//! assert_eq!(next.description, "Add store");
//! ```

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{Result, StepError};
use crate::hosting::HostingApi;
use crate::identity::{generate_task_hash, normalize_description, TaskHash};

fn checkbox_regex() -> &'static Regex {
    static CHECKBOX: OnceLock<Regex> = OnceLock::new();
    CHECKBOX.get_or_init(|| {
        Regex::new(r"^(\s*- \[)([ xX])(\]\s+)(.+?)\s*$").expect("checkbox pattern is valid")
    })
}

/// One checkbox line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistItem {
    /// 1-based position among all checkbox lines
    pub index: u32,
    pub description: String,
    pub completed: bool,
    pub hash: TaskHash,
}

/// Parsed checklist, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Checklist {
    items: Vec<ChecklistItem>,
}

impl Checklist {
    /// Parse markdown. Lines that are not checkboxes are ignored.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let items = content
            .lines()
            .filter_map(|line| checkbox_regex().captures(line))
            .zip(1u32..)
            .map(|(caps, index)| {
                let description = caps[4].to_string();
                ChecklistItem {
                    index,
                    hash: generate_task_hash(&description),
                    completed: !caps[2].trim().is_empty(),
                    description,
                }
            })
            .collect();
        Self { items }
    }

    /// Read and parse a checklist from disk.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::ChecklistUnavailable`] if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StepError::checklist(path.display().to_string(), e.to_string()))?;
        Ok(Self::parse(&content))
    }

    /// Fetch and parse the checklist at `path` on `git_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::ChecklistUnavailable`] if the file is absent or
    /// the hosting call fails.
    pub fn from_branch(hosting: &impl HostingApi, path: &str, git_ref: &str) -> Result<Self> {
        match hosting.get_content(path, git_ref) {
            Ok(Some(file)) => Ok(Self::parse(&file.content)),
            Ok(None) => Err(StepError::checklist(path, format!("not found on {git_ref}"))),
            Err(e) => Err(StepError::checklist(path, e.to_string())),
        }
    }

    #[must_use]
    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at 1-based `index`.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&ChecklistItem> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        self.items.get(position)
    }

    #[must_use]
    pub fn contains_index(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    /// Hashes of every item's description.
    #[must_use]
    pub fn hashes(&self) -> BTreeSet<TaskHash> {
        self.items.iter().map(|item| item.hash.clone()).collect()
    }

    /// First item whose description hashes to `hash`.
    #[must_use]
    pub fn find_by_hash(&self, hash: &TaskHash) -> Option<&ChecklistItem> {
        self.items.iter().find(|item| &item.hash == hash)
    }

    #[must_use]
    pub fn first_unchecked(&self) -> Option<&ChecklistItem> {
        self.items.iter().find(|item| !item.completed)
    }

    /// Number of checked items.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|item| item.completed).count()
    }
}

/// Check off the first unchecked line whose description matches.
///
/// Descriptions compare after whitespace normalization. Returns `None`
/// when no unchecked line matches.
#[must_use]
pub fn mark_task_complete(content: &str, description: &str) -> Option<String> {
    let wanted = normalize_description(description);
    let mut marked = false;

    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if marked {
                return line.to_string();
            }
            match checkbox_regex().captures(line) {
                Some(caps)
                    if caps[2].trim().is_empty() && normalize_description(&caps[4]) == wanted =>
                {
                    marked = true;
                    format!("{}x{}{}", &caps[1], &caps[3], &caps[4])
                }
                _ => line.to_string(),
            }
        })
        .collect();

    if !marked {
        return None;
    }
    if content.ends_with('\n') {
        lines.push(String::new());
    }
    Some(lines.join("\n"))
}

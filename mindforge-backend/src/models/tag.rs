use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{StoreError, StoreResult};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w\-]{1,50}$").unwrap());

/// A tag and the number of notes carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUsage {
    pub name: String,
    pub usage_count: i64,
}

/// Trim and lowercase a tag name. Does not validate.
pub fn normalize_tag(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalize a tag name and check it against the tag format.
pub fn validate_tag(name: &str) -> StoreResult<String> {
    let normalized = normalize_tag(name);
    if !TAG_RE.is_match(&normalized) {
        return Err(StoreError::validation(format!(
            "Invalid tag format: '{}'. Tags may contain letters, numbers, underscores and hyphens, \
             must be 1-50 characters long, and cannot contain spaces.",
            name
        )));
    }
    Ok(normalized)
}

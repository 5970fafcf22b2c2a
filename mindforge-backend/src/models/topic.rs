use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

pub const TOPIC_NAME_MAX_LENGTH: usize = 100;

/// A named container in the topic hierarchy.
///
/// `children` and `note_count` are derived when the tree is built; they are
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub children: Vec<Topic>,
    #[serde(default)]
    pub note_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    /// Number of topics in this subtree, including this one
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Topic::subtree_len).sum::<usize>()
    }
}

/// Outcome of deleting a topic subtree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDeletion {
    /// The deleted topic followed by its descendants
    pub removed_topic_ids: Vec<i64>,
    pub notes_deleted: usize,
    pub notes_unfiled: usize,
}

/// Trim a topic name and check it is non-empty and not too long.
pub fn validate_topic_name(name: &str) -> StoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation("Topic name cannot be empty"));
    }
    if trimmed.chars().count() > TOPIC_NAME_MAX_LENGTH {
        return Err(StoreError::validation(format!(
            "Topic name cannot exceed {} characters",
            TOPIC_NAME_MAX_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

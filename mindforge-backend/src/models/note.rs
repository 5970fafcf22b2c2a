use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::block::Block;
use super::tag::validate_tag;
use crate::error::{StoreError, StoreResult};

pub const NOTE_TITLE_MAX_LENGTH: usize = 200;

/// A titled document made of an ordered block sequence.
///
/// `id` is `None` until the note is first saved. Timestamps are assigned by
/// the store and ignored on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Option<i64>,
    pub title: String,
    pub topic_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Note {
    pub fn new(title: impl Into<String>, topic_id: Option<i64>) -> Self {
        Self {
            id: None,
            title: title.into(),
            topic_id,
            created_at: None,
            updated_at: None,
            blocks: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Check the header fields and tags. Blank tags are ignored; they are
    /// dropped on save. Blocks are checked one by one at save time so a
    /// single bad block does not reject the whole note.
    pub fn validate(&self) -> StoreResult<()> {
        validate_title(&self.title)?;
        validate_topic_ref(self.topic_id)?;
        for tag in self.tags.iter().filter(|t| !t.trim().is_empty()) {
            validate_tag(tag)?;
        }
        Ok(())
    }
}

/// Note header without blocks, as listed under a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteHeader {
    pub id: i64,
    pub title: String,
    pub topic_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a stored block was left out of a loaded note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDiagnostic {
    pub block_id: String,
    pub position: i64,
    pub reason: String,
}

/// A topic reference is either absent or a positive id
pub fn validate_topic_ref(topic_id: Option<i64>) -> StoreResult<()> {
    match topic_id {
        Some(id) if id <= 0 => Err(StoreError::validation("Topic ID must be a positive integer")),
        _ => Ok(()),
    }
}

/// Trim a note title and check it is non-empty and not too long.
pub fn validate_title(title: &str) -> StoreResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation("Note title cannot be empty"));
    }
    if trimmed.chars().count() > NOTE_TITLE_MAX_LENGTH {
        return Err(StoreError::validation(format!(
            "Note title cannot exceed {} characters",
            NOTE_TITLE_MAX_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_note_is_unsaved_and_empty() {
        let note = Note::new("Plan", Some(1));
        assert!(!note.is_persisted());
        assert!(note.blocks.is_empty());
        assert!(note.tags.is_empty());
        assert!(note.validate().is_ok());
    }

    #[test]
    fn test_title_validation() {
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert_eq!(validate_title("  Plan ").unwrap(), "Plan");
        assert!(validate_title(&"x".repeat(NOTE_TITLE_MAX_LENGTH)).is_ok());
        assert!(validate_title(&"x".repeat(NOTE_TITLE_MAX_LENGTH + 1)).is_err());
        // Length is counted in characters, not bytes
        assert!(validate_title(&"я".repeat(NOTE_TITLE_MAX_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_topic_and_tags() {
        let mut note = Note::new("Plan", Some(0));
        assert!(note.validate().is_err());

        note.topic_id = None;
        note.tags = vec!["ok".to_string(), "  ".to_string()];
        assert!(note.validate().is_ok());

        note.tags = vec!["ok".to_string(), "not ok".to_string()];
        assert!(note.validate().unwrap_err().is_validation());
    }
}

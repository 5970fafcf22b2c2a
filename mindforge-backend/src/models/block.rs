//! Typed content blocks that make up a note body.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

pub const MIN_HEADING_LEVEL: i64 = 1;
pub const MAX_HEADING_LEVEL: i64 = 6;

/// Kind of content a block carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, AsRefStr, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BlockType {
    #[default]
    Text,
    Heading,
    BulletList,
    NumberedList,
    Checklist,
    Divider,
}

impl BlockType {
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Bullet, numbered and checklist blocks hold their content in items
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            BlockType::BulletList | BlockType::NumberedList | BlockType::Checklist
        )
    }

    /// Text and heading blocks hold their content in `content`
    pub fn uses_content(&self) -> bool {
        matches!(self, BlockType::Text | BlockType::Heading)
    }
}

/// One entry of a list or checklist block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockItem {
    /// Items stored without an id get a fresh one when read
    #[serde(default = "new_item_id")]
    pub id: String,
    #[serde(default)]
    pub content: String,
    /// Only meaningful inside a checklist
    #[serde(default)]
    pub checked: bool,
}

fn new_item_id() -> String {
    Uuid::new_v4().to_string()
}

impl BlockItem {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: new_item_id(),
            content: content.into(),
            checked: false,
        }
    }

    pub fn checked(content: impl Into<String>, checked: bool) -> Self {
        Self {
            checked,
            ..Self::new(content)
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::validation("Block item ID must be a non-empty string"));
        }
        Ok(())
    }
}

/// A typed unit of note content.
///
/// A block does not know its own position; the owning note's block order is
/// the position, assigned when the note is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub items: Vec<BlockItem>,
    /// Heading level, kept in 1..=6 for every block type
    #[serde(default = "default_level")]
    pub level: i64,
}

fn default_level() -> i64 {
    MIN_HEADING_LEVEL
}

impl Block {
    fn new(block_type: BlockType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            block_type,
            content: String::new(),
            items: Vec::new(),
            level: MIN_HEADING_LEVEL,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::new(BlockType::Text)
        }
    }

    pub fn heading(content: impl Into<String>, level: i64) -> Self {
        Self {
            content: content.into(),
            level,
            ..Self::new(BlockType::Heading)
        }
    }

    pub fn bullet_list(items: Vec<BlockItem>) -> Self {
        Self::list(BlockType::BulletList, items)
    }

    pub fn numbered_list(items: Vec<BlockItem>) -> Self {
        Self::list(BlockType::NumberedList, items)
    }

    pub fn checklist(items: Vec<BlockItem>) -> Self {
        Self::list(BlockType::Checklist, items)
    }

    pub fn divider() -> Self {
        Self::new(BlockType::Divider)
    }

    fn list(block_type: BlockType, items: Vec<BlockItem>) -> Self {
        Self {
            items,
            ..Self::new(block_type)
        }
    }

    /// Change the block's type in place.
    ///
    /// Converting to a non-list type drops the items. Converting into a list
    /// type leaves `items` as-is; the caller supplies at least one item.
    pub fn convert_to(&mut self, block_type: BlockType) {
        if !block_type.is_list() {
            self.items.clear();
        }
        if block_type != BlockType::Heading {
            self.level = MIN_HEADING_LEVEL;
        }
        self.block_type = block_type;
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::validation("Block ID must be a non-empty string"));
        }
        if !(MIN_HEADING_LEVEL..=MAX_HEADING_LEVEL).contains(&self.level) {
            return Err(StoreError::validation(format!(
                "Block level must be between {} and {}, got {}",
                MIN_HEADING_LEVEL, MAX_HEADING_LEVEL, self.level
            )));
        }
        if !self.block_type.is_list() && !self.items.is_empty() {
            return Err(StoreError::validation(format!(
                "Block of type '{}' cannot carry items",
                self.block_type.as_str()
            )));
        }
        for item in &self.items {
            item.validate()?;
        }
        Ok(())
    }

    /// Text searched by substring queries: the block content plus item text
    pub fn searchable_text(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.content.as_str()).chain(self.items.iter().map(|i| i.content.as_str()))
    }
}

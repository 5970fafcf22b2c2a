//! First-run content so a fresh notebook is not empty.

use rusqlite::params;
use std::sync::Arc;

use super::blocks::insert_blocks;
use super::tags::replace_note_tags;
use crate::db::{now_timestamp, Database};
use crate::error::StoreResult;
use crate::models::{Block, BlockItem};

pub const WELCOME_TOPIC: &str = "Personal";
pub const WELCOME_NOTE: &str = "Welcome";

fn welcome_blocks() -> Vec<Block> {
    vec![
        Block::heading("Welcome to Mindforge", 1),
        Block::text("Notes live in topics and are made of blocks. Tag them and search across everything."),
        Block::checklist(vec![
            BlockItem::new("Create a topic"),
            BlockItem::new("Write a note"),
            BlockItem::new("Add a tag"),
        ]),
    ]
}

/// Create a starter topic and note when the store holds no topics and no
/// notes. Returns whether anything was created. Either both rows are
/// written or neither is.
pub fn ensure_welcome(db: &Arc<Database>) -> StoreResult<bool> {
    let seeded = db.transaction(|tx| {
        let (topics, notes): (i64, i64) = tx.query_row(
            "SELECT (SELECT COUNT(*) FROM topics), (SELECT COUNT(*) FROM notes)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if topics > 0 || notes > 0 {
            return Ok(None);
        }

        let now = now_timestamp();
        tx.execute(
            "INSERT INTO topics (name, parent_id, created_at, updated_at) VALUES (?1, NULL, ?2, ?2)",
            params![WELCOME_TOPIC, now],
        )?;
        let topic_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO notes (title, topic_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![WELCOME_NOTE, topic_id, now],
        )?;
        let note_id = tx.last_insert_rowid();

        insert_blocks(tx, note_id, &welcome_blocks())?;
        replace_note_tags(tx, note_id, &["welcome"])?;
        Ok(Some((topic_id, note_id)))
    })?;

    match seeded {
        Some((topic_id, note_id)) => {
            log::info!("[SEED] Created welcome note {} in topic {}", note_id, topic_id);
            Ok(true)
        }
        None => Ok(false),
    }
}

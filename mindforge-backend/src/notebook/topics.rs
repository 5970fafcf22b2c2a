//! Topic storage over the self-referential topic tree.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use super::log_storage_failure;
use super::tree::{sibling_order, TopicTree};
use crate::db::{now_timestamp, row_exists, timestamp_column, Database};
use crate::error::{EntityKind, StoreError, StoreResult};
use crate::models::{validate_topic_name, validate_topic_ref, Topic, TopicDeletion};

pub struct TopicStore {
    db: Arc<Database>,
}

impl TopicStore {
    pub fn new(db: Arc<Database>) -> Self {
        TopicStore { db }
    }

    /// Create a topic, optionally under `parent_id`
    pub fn create(&self, name: &str, parent_id: Option<i64>) -> StoreResult<i64> {
        let name = validate_topic_name(name)?;
        validate_topic_ref(parent_id)?;

        let id = self.db.transaction(|tx| {
            if let Some(pid) = parent_id {
                if !row_exists(tx, "topics", pid)? {
                    return Err(StoreError::not_found(EntityKind::Topic, pid));
                }
            }
            let now = now_timestamp();
            tx.execute(
                "INSERT INTO topics (name, parent_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![name, parent_id, now],
            )?;
            Ok(tx.last_insert_rowid())
        })?;

        log::info!("[TOPICS] Created topic {} '{}' (parent {:?})", id, name, parent_id);
        Ok(id)
    }

    pub fn get(&self, topic_id: i64) -> StoreResult<Topic> {
        let conn = self.db.conn()?;
        conn.query_row(
            &format!("{} WHERE t.id = ?1", SELECT_TOPICS),
            [topic_id],
            row_to_topic,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found(EntityKind::Topic, topic_id))
    }

    /// All topics as a flat list ordered by name
    pub fn list(&self) -> StoreResult<Vec<Topic>> {
        let conn = self.db.conn()?;
        load_flat(&conn)
    }

    /// Rename a topic. Returns `false` when the name is unchanged.
    pub fn rename(&self, topic_id: i64, new_name: &str) -> StoreResult<bool> {
        let new_name = validate_topic_name(new_name)?;

        self.db.transaction(|tx| {
            let current: String = tx
                .query_row("SELECT name FROM topics WHERE id = ?1", [topic_id], |row| row.get(0))
                .optional()?
                .ok_or_else(|| StoreError::not_found(EntityKind::Topic, topic_id))?;

            if current == new_name {
                return Ok(false);
            }

            tx.execute(
                "UPDATE topics SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_name, now_timestamp(), topic_id],
            )?;
            log::info!("[TOPICS] Renamed topic {} '{}' -> '{}'", topic_id, current, new_name);
            Ok(true)
        })
    }

    /// Reparent a topic. Moving a topic under itself or one of its own
    /// descendants is rejected.
    pub fn move_to(&self, topic_id: i64, new_parent_id: Option<i64>) -> StoreResult<()> {
        validate_topic_ref(new_parent_id)?;
        self.db.transaction(|tx| {
            if !row_exists(tx, "topics", topic_id)? {
                return Err(StoreError::not_found(EntityKind::Topic, topic_id));
            }
            if let Some(pid) = new_parent_id {
                if !row_exists(tx, "topics", pid)? {
                    return Err(StoreError::not_found(EntityKind::Topic, pid));
                }
                let tree = TopicTree::from_flat(load_flat(tx)?);
                if tree.is_self_or_ancestor(topic_id, pid) {
                    return Err(StoreError::validation(format!(
                        "Cannot move topic {} under itself or one of its descendants",
                        topic_id
                    )));
                }
            }

            tx.execute(
                "UPDATE topics SET parent_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_parent_id, now_timestamp(), topic_id],
            )?;
            log::info!("[TOPICS] Moved topic {} under {:?}", topic_id, new_parent_id);
            Ok(())
        })
    }

    /// Delete a topic and every descendant topic.
    ///
    /// With `cascade_notes` the notes filed anywhere in the subtree are
    /// deleted too (with their blocks and tag links); otherwise they are
    /// unfiled. Everything happens in one transaction.
    pub fn delete(&self, topic_id: i64, cascade_notes: bool) -> StoreResult<TopicDeletion> {
        let result = self.db.transaction(|tx| {
            if !row_exists(tx, "topics", topic_id)? {
                return Err(StoreError::not_found(EntityKind::Topic, topic_id));
            }

            let tree = TopicTree::from_flat(load_flat(tx)?);
            let subtree = tree.subtree_ids(topic_id);
            let mut deletion = TopicDeletion {
                removed_topic_ids: subtree.clone(),
                ..Default::default()
            };

            if cascade_notes {
                let mut stmt = tx.prepare("DELETE FROM notes WHERE topic_id = ?1")?;
                for id in &subtree {
                    deletion.notes_deleted += stmt.execute([id])?;
                }
            } else {
                let mut stmt = tx.prepare("UPDATE notes SET topic_id = NULL WHERE topic_id = ?1")?;
                for id in &subtree {
                    deletion.notes_unfiled += stmt.execute([id])?;
                }
            }

            // Leaves first, so each statement removes exactly one row
            let mut stmt = tx.prepare("DELETE FROM topics WHERE id = ?1")?;
            for id in subtree.iter().rev() {
                stmt.execute([id])?;
            }

            Ok(deletion)
        });
        let result = log_storage_failure("delete topic", result)?;

        log::info!(
            "[TOPICS] Deleted topic {} ({} topics, {} notes deleted, {} notes unfiled)",
            topic_id,
            result.removed_topic_ids.len(),
            result.notes_deleted,
            result.notes_unfiled
        );
        Ok(result)
    }

    /// The topic forest with children nested and siblings sorted by name
    pub fn tree(&self) -> StoreResult<Vec<Topic>> {
        let conn = self.db.conn()?;
        Ok(TopicTree::from_flat(load_flat(&conn)?).into_forest())
    }

    /// Number of notes filed directly under a topic (not its descendants)
    pub fn count_notes(&self, topic_id: i64) -> StoreResult<i64> {
        let conn = self.db.conn()?;
        if !row_exists(&conn, "topics", topic_id)? {
            return Err(StoreError::not_found(EntityKind::Topic, topic_id));
        }
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE topic_id = ?1",
            [topic_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

const SELECT_TOPICS: &str = "SELECT t.id, t.name, t.parent_id, t.created_at, t.updated_at,
        (SELECT COUNT(*) FROM notes n WHERE n.topic_id = t.id)
     FROM topics t";

fn load_flat(conn: &Connection) -> StoreResult<Vec<Topic>> {
    let mut stmt = conn.prepare(SELECT_TOPICS)?;
    let mut topics = stmt
        .query_map([], row_to_topic)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    // NOCASE only folds ASCII; order the way the tree orders siblings
    topics.sort_by_cached_key(sibling_order);
    Ok(topics)
}

fn row_to_topic(row: &rusqlite::Row) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        children: Vec::new(),
        note_count: row.get(5)?,
        created_at: timestamp_column(row, 3)?,
        updated_at: timestamp_column(row, 4)?,
    })
}

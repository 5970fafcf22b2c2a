//! Note storage: headers plus atomic full-replace persistence of each
//! note's blocks and tags.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use super::blocks::{insert_blocks, load_blocks};
use super::tags::{note_tag_names, replace_note_tags};
use super::log_storage_failure;
use crate::db::{now_timestamp, row_exists, timestamp_column, Database};
use crate::error::{EntityKind, StoreError, StoreResult};
use crate::models::{validate_title, validate_topic_ref, BlockDiagnostic, BlockType, Note, NoteHeader};

pub struct NoteStore {
    db: Arc<Database>,
}

impl NoteStore {
    pub fn new(db: Arc<Database>) -> Self {
        NoteStore { db }
    }

    /// Create an empty note, optionally filed under a topic
    pub fn create(&self, title: &str, topic_id: Option<i64>) -> StoreResult<i64> {
        let title = validate_title(title)?;

        let id = self.db.transaction(|tx| {
            require_topic(tx, topic_id)?;
            let now = now_timestamp();
            tx.execute(
                "INSERT INTO notes (title, topic_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![title, topic_id, now],
            )?;
            Ok(tx.last_insert_rowid())
        })?;

        log::info!("[NOTES] Created note {} '{}'", id, title);
        Ok(id)
    }

    /// Persist a whole note: header, block sequence and tags.
    ///
    /// An unsaved note is inserted; a saved one has its header updated and
    /// its blocks and tags replaced. All of it happens in one transaction.
    /// Malformed blocks are skipped with a warning instead of failing the save.
    pub fn save(&self, note: &Note) -> StoreResult<i64> {
        note.validate()?;
        let title = validate_title(&note.title)?;

        let result = self.db.transaction(|tx| {
            require_topic(tx, note.topic_id)?;
            let now = now_timestamp();

            let note_id = match note.id {
                None => {
                    tx.execute(
                        "INSERT INTO notes (title, topic_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                        params![title, note.topic_id, now],
                    )?;
                    tx.last_insert_rowid()
                }
                Some(id) => {
                    let updated = tx.execute(
                        "UPDATE notes SET title = ?1, topic_id = ?2, updated_at = ?3 WHERE id = ?4",
                        params![title, note.topic_id, now, id],
                    )?;
                    if updated == 0 {
                        return Err(StoreError::not_found(EntityKind::Note, id));
                    }
                    tx.execute("DELETE FROM blocks WHERE note_id = ?1", [id])?;
                    id
                }
            };

            let written = insert_blocks(tx, note_id, &note.blocks)?;
            replace_note_tags(tx, note_id, note.tags.as_slice())?;
            Ok((note_id, written))
        });

        let (note_id, written) = log_storage_failure("save note", result)?;
        if written < note.blocks.len() {
            log::warn!(
                "[NOTES] Saved note {} with {} of {} blocks",
                note_id,
                written,
                note.blocks.len()
            );
        } else {
            log::debug!("[NOTES] Saved note {} ({} blocks)", note_id, written);
        }
        Ok(note_id)
    }

    /// Load a note with its blocks in order and its tags.
    /// Unreadable blocks are left out.
    pub fn get(&self, note_id: i64) -> StoreResult<Option<Note>> {
        Ok(self.get_with_diagnostics(note_id)?.map(|(note, _)| note))
    }

    /// Like [`get`](Self::get), also reporting every stored block that was left out
    pub fn get_with_diagnostics(&self, note_id: i64) -> StoreResult<Option<(Note, Vec<BlockDiagnostic>)>> {
        let conn = self.db.conn()?;
        let Some(header) = load_header(&conn, note_id)? else {
            return Ok(None);
        };
        let (blocks, diagnostics) = load_blocks(&conn, note_id)?;
        let tags = note_tag_names(&conn, note_id)?;

        let note = Note {
            id: Some(header.id),
            title: header.title,
            topic_id: header.topic_id,
            created_at: Some(header.created_at),
            updated_at: Some(header.updated_at),
            blocks,
            tags,
        };
        Ok(Some((note, diagnostics)))
    }

    /// Delete a note with its blocks and tag links.
    /// Returns `false` when there was no such note.
    pub fn delete(&self, note_id: i64) -> StoreResult<bool> {
        let conn = self.db.conn()?;
        let removed = conn.execute("DELETE FROM notes WHERE id = ?1", [note_id])? > 0;
        if removed {
            log::info!("[NOTES] Deleted note {}", note_id);
        }
        Ok(removed)
    }

    /// Change only the title
    pub fn rename(&self, note_id: i64, new_title: &str) -> StoreResult<()> {
        let title = validate_title(new_title)?;
        let conn = self.db.conn()?;
        let updated = conn.execute(
            "UPDATE notes SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, now_timestamp(), note_id],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found(EntityKind::Note, note_id));
        }
        Ok(())
    }

    /// File a note under another topic, or unfile it with `None`
    pub fn set_topic(&self, note_id: i64, topic_id: Option<i64>) -> StoreResult<()> {
        self.db.transaction(|tx| {
            require_topic(tx, topic_id)?;
            let updated = tx.execute(
                "UPDATE notes SET topic_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![topic_id, now_timestamp(), note_id],
            )?;
            if updated == 0 {
                return Err(StoreError::not_found(EntityKind::Note, note_id));
            }
            Ok(())
        })
    }

    /// Overwrite the text of one text or heading block without rewriting
    /// the rest of the note
    pub fn update_block_content(&self, note_id: i64, block_id: &str, content: &str) -> StoreResult<()> {
        self.db.transaction(|tx| {
            let stored_type: String = tx
                .query_row(
                    "SELECT type FROM blocks WHERE id = ?1 AND note_id = ?2",
                    params![block_id, note_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::not_found(EntityKind::Block, block_id))?;

            let uses_content = stored_type
                .parse::<BlockType>()
                .map(|t| t.uses_content())
                .unwrap_or(false);
            if !uses_content {
                return Err(StoreError::validation(format!(
                    "Block '{}' of type '{}' has no text content",
                    block_id, stored_type
                )));
            }

            let now = now_timestamp();
            tx.execute(
                "UPDATE blocks SET content = ?1 WHERE id = ?2",
                params![content, block_id],
            )?;
            tx.execute(
                "UPDATE notes SET updated_at = ?1 WHERE id = ?2",
                params![now, note_id],
            )?;
            Ok(())
        })
    }

    /// Note headers, most recently updated first. With a topic, only the
    /// notes filed directly under it.
    pub fn list(&self, topic_id: Option<i64>) -> StoreResult<Vec<NoteHeader>> {
        let conn = self.db.conn()?;
        let headers = match topic_id {
            Some(tid) => {
                if !row_exists(&conn, "topics", tid)? {
                    return Err(StoreError::not_found(EntityKind::Topic, tid));
                }
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE topic_id = ?1 ORDER BY updated_at DESC, id DESC",
                    SELECT_HEADERS
                ))?;
                let headers = stmt
                    .query_map([tid], row_to_header)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                headers
            }
            None => {
                let mut stmt = conn.prepare(&format!("{} ORDER BY updated_at DESC, id DESC", SELECT_HEADERS))?;
                let headers = stmt
                    .query_map([], row_to_header)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                headers
            }
        };
        Ok(headers)
    }
}

const SELECT_HEADERS: &str = "SELECT id, title, topic_id, created_at, updated_at FROM notes";

fn require_topic(conn: &Connection, topic_id: Option<i64>) -> StoreResult<()> {
    validate_topic_ref(topic_id)?;
    if let Some(tid) = topic_id {
        if !row_exists(conn, "topics", tid)? {
            return Err(StoreError::not_found(EntityKind::Topic, tid));
        }
    }
    Ok(())
}

fn load_header(conn: &Connection, note_id: i64) -> StoreResult<Option<NoteHeader>> {
    Ok(conn
        .query_row(&format!("{} WHERE id = ?1", SELECT_HEADERS), [note_id], row_to_header)
        .optional()?)
}

fn row_to_header(row: &rusqlite::Row) -> rusqlite::Result<NoteHeader> {
    Ok(NoteHeader {
        id: row.get(0)?,
        title: row.get(1)?,
        topic_id: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
        updated_at: timestamp_column(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, BlockItem};
    use crate::notebook::test_support::open_test_db;
    use crate::notebook::{TagIndex, TopicStore};

    #[test]
    fn test_create_validates_title_and_topic() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db);

        assert!(notes.create("   ", None).unwrap_err().is_validation());
        assert!(notes.create(&"t".repeat(201), None).unwrap_err().is_validation());
        assert!(notes.create("Plan", Some(3)).unwrap_err().is_not_found());
        assert!(notes.list(None).unwrap().is_empty());

        let id = notes.create("  Plan ", None).unwrap();
        let note = notes.get(id).unwrap().unwrap();
        assert_eq!(note.title, "Plan");
        assert!(note.blocks.is_empty());
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn test_plan_round_trip_scenario() {
        let (_dir, db) = open_test_db();
        let topics = TopicStore::new(db.clone());
        let notes = NoteStore::new(db);

        let work = topics.create("Work", None).unwrap();
        let mut plan = Note::new("Plan", Some(work));
        plan.blocks = vec![
            Block::text("draft"),
            Block::checklist(vec![BlockItem::new("buy milk")]),
        ];
        let id = notes.save(&plan).unwrap();

        let loaded = notes.get(id).unwrap().expect("note exists");
        assert_eq!(loaded.title, "Plan");
        assert_eq!(loaded.topic_id, Some(work));
        assert_eq!(loaded.blocks.len(), 2);
        assert_eq!(loaded.blocks[0].block_type, BlockType::Text);
        assert_eq!(loaded.blocks[0].content, "draft");
        assert_eq!(loaded.blocks[1].block_type, BlockType::Checklist);
        assert_eq!(loaded.blocks[1].items[0].content, "buy milk");
        assert!(!loaded.blocks[1].items[0].checked);
        assert_eq!(loaded.blocks, plan.blocks);

        topics.delete(work, false).unwrap();
        let survivor = notes.get(id).unwrap().expect("note survives topic delete");
        assert_eq!(survivor.topic_id, None);
        assert_eq!(survivor.blocks.len(), 2);
    }

    #[test]
    fn test_save_replaces_blocks_and_tags() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db.clone());
        let tags = TagIndex::new(db);

        let mut note = Note::new("Plan", None);
        note.blocks = vec![Block::text("one"), Block::text("two"), Block::divider()];
        note.tags = vec!["Work".to_string(), "work ".to_string(), "ideas".to_string()];
        let id = notes.save(&note).unwrap();

        let mut loaded = notes.get(id).unwrap().unwrap();
        assert_eq!(loaded.tags, vec!["ideas", "work"]);
        let first_created = loaded.created_at;

        loaded.title = "Plan v2".to_string();
        loaded.blocks.remove(1);
        loaded.blocks.insert(0, Block::heading("Top", 2));
        loaded.tags = vec!["done".to_string()];
        assert_eq!(notes.save(&loaded).unwrap(), id);

        let again = notes.get(id).unwrap().unwrap();
        assert_eq!(again.title, "Plan v2");
        assert_eq!(again.blocks, loaded.blocks);
        assert_eq!(again.tags, vec!["done"]);
        assert_eq!(again.created_at, first_created);
        assert!(again.updated_at > loaded.updated_at);

        let usage: Vec<(String, i64)> = tags.all().unwrap().into_iter().map(|t| (t.name, t.usage_count)).collect();
        assert!(usage.contains(&("done".to_string(), 1)));
        assert!(usage.contains(&("work".to_string(), 0)));
    }

    #[test]
    fn test_save_skips_malformed_blocks() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db);

        let mut note = Note::new("Lenient", None);
        let mut bad_level = Block::heading("Huge", 7);
        bad_level.id = "bad-level".to_string();
        let mut text_with_items = Block::text("odd");
        text_with_items.items.push(BlockItem::new("stray"));
        let mut blank_id = Block::text("anon");
        blank_id.id = " ".to_string();
        let keep_a = Block::text("a");
        let keep_b = Block::numbered_list(vec![BlockItem::new("1")]);
        note.blocks = vec![bad_level, keep_a.clone(), text_with_items, blank_id, keep_b.clone()];

        let id = notes.save(&note).unwrap();
        let loaded = notes.get(id).unwrap().unwrap();
        assert_eq!(loaded.blocks, vec![keep_a, keep_b]);
    }

    #[test]
    fn test_save_rejects_bad_header_before_writing() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db);

        let mut note = Note::new("", None);
        assert!(notes.save(&note).unwrap_err().is_validation());

        note.title = "Fine".to_string();
        note.tags = vec!["has space".to_string()];
        assert!(notes.save(&note).unwrap_err().is_validation());

        note.tags.clear();
        note.topic_id = Some(99);
        assert!(notes.save(&note).unwrap_err().is_not_found());

        assert!(notes.list(None).unwrap().is_empty());
    }

    #[test]
    fn test_non_positive_topic_id_is_invalid_everywhere() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db);

        assert!(notes.create("Zero", Some(0)).unwrap_err().is_validation());
        assert!(notes.save(&Note::new("Zero", Some(0))).unwrap_err().is_validation());

        let id = notes.create("Filed later", None).unwrap();
        assert!(notes.set_topic(id, Some(-3)).unwrap_err().is_validation());
        assert!(notes.set_topic(id, Some(8)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_save_unknown_id_is_not_found() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db);

        let mut note = Note::new("Ghost", None);
        note.id = Some(1234);
        assert!(notes.save(&note).unwrap_err().is_not_found());
        assert!(notes.get(1234).unwrap().is_none());
    }

    #[test]
    fn test_failed_save_keeps_previous_state() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db.clone());

        let mut note = Note::new("Stable", None);
        note.blocks = vec![Block::text("original")];
        note.tags = vec!["kept".to_string()];
        let id = notes.save(&note).unwrap();

        // The missing topic aborts the whole save
        let mut changed = notes.get(id).unwrap().unwrap();
        changed.title = "Changed".to_string();
        changed.blocks = vec![Block::text("new")];
        changed.tags = vec!["new".to_string()];
        changed.topic_id = Some(77);
        assert!(notes.save(&changed).is_err());

        let loaded = notes.get(id).unwrap().unwrap();
        assert_eq!(loaded.title, "Stable");
        assert_eq!(loaded.blocks[0].content, "original");
        assert_eq!(loaded.tags, vec!["kept"]);
    }

    #[test]
    fn test_save_rolls_back_after_blocks_were_rewritten() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db.clone());

        let mut note = Note::new("Stable", None);
        note.blocks = vec![Block::text("original")];
        let id = notes.save(&note).unwrap();

        // Fail on tag linking, after the header update and block rewrite ran
        db.conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_tag_links BEFORE INSERT ON note_tags
                 BEGIN SELECT RAISE(ABORT, 'tag links disabled'); END;",
            )
            .unwrap();

        let mut changed = notes.get(id).unwrap().unwrap();
        changed.title = "Changed".to_string();
        changed.blocks = vec![Block::heading("new", 1), Block::divider()];
        changed.tags = vec!["fresh".to_string()];
        let err = notes.save(&changed).unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));

        let loaded = notes.get(id).unwrap().unwrap();
        assert_eq!(loaded.title, "Stable");
        assert_eq!(loaded.blocks, note.blocks);
        assert!(loaded.tags.is_empty());
        assert_eq!(loaded.updated_at, changed.updated_at);

        let tags: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))
            .unwrap();
        assert_eq!(tags, 0);
    }

    #[test]
    fn test_block_ids_are_not_shared_between_notes() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db);

        let shared = Block::text("mine");
        let mut first = Note::new("First", None);
        first.blocks = vec![shared.clone()];
        let first_id = notes.save(&first).unwrap();

        let mut second = Note::new("Second", None);
        second.blocks = vec![shared.clone(), Block::text("own")];
        let second_id = notes.save(&second).unwrap();

        assert_eq!(notes.get(first_id).unwrap().unwrap().blocks, vec![shared]);
        assert_eq!(notes.get(second_id).unwrap().unwrap().blocks.len(), 1);
    }

    #[test]
    fn test_get_with_diagnostics_reports_skipped_rows() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db.clone());

        let mut note = Note::new("Mixed", None);
        note.blocks = vec![Block::text("fine")];
        let id = notes.save(&note).unwrap();
        db.conn()
            .unwrap()
            .execute(
                "INSERT INTO blocks (id, note_id, type, items_json, level, position)
                 VALUES ('corrupt', ?1, 'bullet_list', '[{\"content\": 5}]', 1, 1)",
                [id],
            )
            .unwrap();

        let (loaded, diagnostics) = notes.get_with_diagnostics(id).unwrap().unwrap();
        assert_eq!(loaded.blocks.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].block_id, "corrupt");
        assert!(notes.get_with_diagnostics(999).unwrap().is_none());
    }

    #[test]
    fn test_delete_reports_whether_removed() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db.clone());

        let mut note = Note::new("Bye", None);
        note.blocks = vec![Block::text("x")];
        note.tags = vec!["t".to_string()];
        let id = notes.save(&note).unwrap();

        assert!(notes.delete(id).unwrap());
        assert!(!notes.delete(id).unwrap());
        assert!(notes.get(id).unwrap().is_none());

        let conn = db.conn().unwrap();
        let blocks: i64 = conn.query_row("SELECT COUNT(*) FROM blocks", [], |r| r.get(0)).unwrap();
        let links: i64 = conn.query_row("SELECT COUNT(*) FROM note_tags", [], |r| r.get(0)).unwrap();
        assert_eq!((blocks, links), (0, 0));
    }

    #[test]
    fn test_rename_and_set_topic() {
        let (_dir, db) = open_test_db();
        let topics = TopicStore::new(db.clone());
        let notes = NoteStore::new(db);

        let mut note = Note::new("Draft", None);
        note.blocks = vec![Block::text("body")];
        let id = notes.save(&note).unwrap();
        let block_id = note.blocks[0].id.clone();

        notes.rename(id, " Final ").unwrap();
        assert!(notes.rename(id, "").unwrap_err().is_validation());
        assert!(notes.rename(404, "x").unwrap_err().is_not_found());

        let home = topics.create("Home", None).unwrap();
        notes.set_topic(id, Some(home)).unwrap();
        assert!(notes.set_topic(id, Some(505)).unwrap_err().is_not_found());
        assert!(notes.set_topic(404, None).unwrap_err().is_not_found());

        let loaded = notes.get(id).unwrap().unwrap();
        assert_eq!(loaded.title, "Final");
        assert_eq!(loaded.topic_id, Some(home));
        // Header edits leave blocks alone
        assert_eq!(loaded.blocks[0].id, block_id);
    }

    #[test]
    fn test_update_block_content() {
        let (_dir, db) = open_test_db();
        let notes = NoteStore::new(db);

        let mut note = Note::new("Edit", None);
        note.blocks = vec![Block::heading("Old", 2), Block::divider()];
        let id = notes.save(&note).unwrap();
        let before = notes.get(id).unwrap().unwrap();

        notes.update_block_content(id, &note.blocks[0].id, "New").unwrap();
        let after = notes.get(id).unwrap().unwrap();
        assert_eq!(after.blocks[0].content, "New");
        assert_eq!(after.blocks[0].level, 2);
        assert!(after.updated_at > before.updated_at);

        let divider_id = note.blocks[1].id.clone();
        assert!(notes.update_block_content(id, &divider_id, "x").unwrap_err().is_validation());
        assert!(notes.update_block_content(id, "missing", "x").unwrap_err().is_not_found());
        assert!(notes.update_block_content(999, &note.blocks[0].id, "x").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_orders_by_recent_update() {
        let (_dir, db) = open_test_db();
        let topics = TopicStore::new(db.clone());
        let notes = NoteStore::new(db);

        let work = topics.create("Work", None).unwrap();
        let a = notes.create("A", Some(work)).unwrap();
        let b = notes.create("B", Some(work)).unwrap();
        let loose = notes.create("Loose", None).unwrap();
        notes.rename(a, "A2").unwrap();

        let ids: Vec<i64> = notes.list(None).unwrap().iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![a, loose, b]);

        let in_work: Vec<i64> = notes.list(Some(work)).unwrap().iter().map(|h| h.id).collect();
        assert_eq!(in_work, vec![a, b]);
        assert!(notes.list(Some(404)).unwrap_err().is_not_found());
    }
}

//! Tag vocabulary and the note <-> tag association table.
//!
//! The connection-level functions are shared with the note store so tag
//! replacement can run inside the same transaction as a note save.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::db::{row_exists, Database};
use crate::error::{EntityKind, StoreError, StoreResult};
use crate::models::{validate_tag, TagUsage};

pub struct TagIndex {
    db: Arc<Database>,
}

impl TagIndex {
    pub fn new(db: Arc<Database>) -> Self {
        TagIndex { db }
    }

    /// Normalize `name` and return its tag id, creating the tag if needed
    pub fn ensure(&self, name: &str) -> StoreResult<i64> {
        let name = validate_tag(name)?;
        let conn = self.db.conn()?;
        ensure_tag(&conn, &name)
    }

    /// Link a tag to a note. Returns `false` if the link already existed.
    pub fn attach(&self, note_id: i64, name: &str) -> StoreResult<bool> {
        let name = validate_tag(name)?;
        self.db.transaction(|tx| {
            require_note(tx, note_id)?;
            let tag_id = ensure_tag(tx, &name)?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?1, ?2)",
                params![note_id, tag_id],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Unlink a tag from a note. Returns `false` if there was no link.
    /// The tag itself stays in the vocabulary.
    pub fn detach(&self, note_id: i64, name: &str) -> StoreResult<bool> {
        let name = validate_tag(name)?;
        let conn = self.db.conn()?;
        require_note(&conn, note_id)?;
        let removed = conn.execute(
            "DELETE FROM note_tags
             WHERE note_id = ?1 AND tag_id = (SELECT id FROM tags WHERE name = ?2)",
            params![note_id, name],
        )?;
        Ok(removed > 0)
    }

    /// Replace every tag link of a note with `names`
    pub fn replace_for_note<S: AsRef<str>>(&self, note_id: i64, names: &[S]) -> StoreResult<Vec<String>> {
        self.db.transaction(|tx| {
            require_note(tx, note_id)?;
            replace_note_tags(tx, note_id, names)
        })
    }

    /// Every tag with the number of notes carrying it, most used first.
    /// Unused tags are included with a count of zero.
    pub fn all(&self) -> StoreResult<Vec<TagUsage>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT t.name, COUNT(nt.note_id) AS usage_count
             FROM tags t
             LEFT JOIN note_tags nt ON nt.tag_id = t.id
             GROUP BY t.id
             ORDER BY usage_count DESC, t.name ASC",
        )?;
        let tags = stmt
            .query_map([], |row| {
                Ok(TagUsage {
                    name: row.get(0)?,
                    usage_count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    pub fn tags_for_note(&self, note_id: i64) -> StoreResult<Vec<String>> {
        let conn = self.db.conn()?;
        require_note(&conn, note_id)?;
        Ok(note_tag_names(&conn, note_id)?)
    }
}

fn require_note(conn: &Connection, note_id: i64) -> StoreResult<()> {
    if row_exists(conn, "notes", note_id)? {
        Ok(())
    } else {
        Err(StoreError::not_found(EntityKind::Note, note_id))
    }
}

/// Upsert-or-fetch on an already normalized name
pub(crate) fn ensure_tag(conn: &Connection, name: &str) -> StoreResult<i64> {
    if conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])? > 0 {
        log::debug!("[TAGS] Created tag '{}'", name);
    }
    let id = conn
        .query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| StoreError::not_found(EntityKind::Tag, name))?;
    Ok(id)
}

/// Clear a note's tag links and re-add `names`, trimmed, lowercased,
/// deduplicated, with blank entries dropped. Every name is checked before
/// anything is written. Returns the stored names in order.
pub(crate) fn replace_note_tags<S: AsRef<str>>(
    conn: &Connection,
    note_id: i64,
    names: &[S],
) -> StoreResult<Vec<String>> {
    let wanted = names
        .iter()
        .map(|n| n.as_ref())
        .filter(|n| !n.trim().is_empty())
        .map(validate_tag)
        .collect::<StoreResult<BTreeSet<String>>>()?;

    conn.execute("DELETE FROM note_tags WHERE note_id = ?1", [note_id])?;
    let mut link = conn.prepare("INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?1, ?2)")?;
    for name in &wanted {
        let tag_id = ensure_tag(conn, name)?;
        link.execute(params![note_id, tag_id])?;
    }
    Ok(wanted.into_iter().collect())
}

pub(crate) fn note_tag_names(conn: &Connection, note_id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM tags t
         JOIN note_tags nt ON nt.tag_id = t.id
         WHERE nt.note_id = ?1
         ORDER BY t.name",
    )?;
    let names = stmt
        .query_map([note_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

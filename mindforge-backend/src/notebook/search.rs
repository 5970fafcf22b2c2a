//! Read-only substring search across note titles, block text and tags.

use rusqlite::{params_from_iter, Connection};
use std::sync::Arc;

use super::blocks::load_blocks;
use super::log_storage_failure;
use super::tags::note_tag_names;
use crate::db::{timestamp_column, Database};
use crate::error::StoreResult;
use crate::models::{normalize_tag, NoteSummary};

pub struct SearchIndex {
    db: Arc<Database>,
}

struct Candidate {
    id: i64,
    title: String,
    topic_name: Option<String>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl SearchIndex {
    pub fn new(db: Arc<Database>) -> Self {
        SearchIndex { db }
    }

    /// Notes whose title or block text contains `query` (case-insensitive),
    /// optionally restricted to notes carrying `tag`. Most recently updated
    /// first.
    ///
    /// A blank query without a tag matches nothing.
    pub fn search(&self, query: &str, tag: Option<&str>) -> StoreResult<Vec<NoteSummary>> {
        let needle = query.trim().to_lowercase();
        let tag = tag.map(normalize_tag).filter(|t| !t.is_empty());
        if needle.is_empty() && tag.is_none() {
            return Ok(Vec::new());
        }

        let result = self.run(&needle, tag.as_deref());
        let summaries = log_storage_failure("search notes", result)?;
        log::debug!(
            "[SEARCH] '{}' (tag {:?}) matched {} notes",
            needle,
            tag,
            summaries.len()
        );
        Ok(summaries)
    }

    fn run(&self, needle: &str, tag: Option<&str>) -> StoreResult<Vec<NoteSummary>> {
        let conn = self.db.conn()?;
        let pattern = like_pattern(needle);
        let mut summaries = Vec::new();
        for candidate in candidates(&conn, tag, pattern.as_deref())? {
            if !needle.is_empty() && !note_contains(&conn, &candidate, needle)? {
                continue;
            }
            let tags = note_tag_names(&conn, candidate.id)?;
            summaries.push(NoteSummary {
                id: candidate.id,
                title: candidate.title,
                topic_name: candidate.topic_name,
                updated_at: candidate.updated_at,
                tags,
            });
        }
        Ok(summaries)
    }
}

/// A LIKE pattern that keeps every note `needle` could match, or `None`
/// when SQL cannot narrow the set safely. Non-ASCII needles fall outside
/// LIKE's ASCII-only case folding, and quotes, backslashes or control
/// characters are escaped inside `items_json`.
fn like_pattern(needle: &str) -> Option<String> {
    if needle.is_empty()
        || !needle.is_ascii()
        || needle.chars().any(|c| c == '"' || c == '\\' || c.is_ascii_control())
    {
        return None;
    }
    let escaped = needle.replace('%', r"\%").replace('_', r"\_");
    Some(format!("%{}%", escaped))
}

/// Notes passing the tag filter and the optional LIKE prefilter, newest
/// first. The prefilter may over-match (JSON keys, block types the search
/// ignores), so callers still check the text.
fn candidates(conn: &Connection, tag: Option<&str>, pattern: Option<&str>) -> StoreResult<Vec<Candidate>> {
    let mut sql = String::from(
        "SELECT n.id, n.title, t.name, n.updated_at
         FROM notes n
         LEFT JOIN topics t ON t.id = n.topic_id",
    );
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<&str> = Vec::new();

    if let Some(tag) = tag {
        values.push(tag);
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM note_tags nt JOIN tags g ON g.id = nt.tag_id
                     WHERE nt.note_id = n.id AND g.name = ?{})",
            values.len()
        ));
    }
    if let Some(pattern) = pattern {
        values.push(pattern);
        let idx = values.len();
        clauses.push(format!(
            "(n.title LIKE ?{idx} ESCAPE '\\'
              OR EXISTS (SELECT 1 FROM blocks b WHERE b.note_id = n.id
                         AND (b.content LIKE ?{idx} ESCAPE '\\' OR b.items_json LIKE ?{idx} ESCAPE '\\')))"
        ));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY n.updated_at DESC, n.id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), row_to_candidate)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn row_to_candidate(row: &rusqlite::Row) -> rusqlite::Result<Candidate> {
    Ok(Candidate {
        id: row.get(0)?,
        title: row.get(1)?,
        topic_name: row.get(2)?,
        updated_at: timestamp_column(row, 3)?,
    })
}

/// Final say on a candidate, with Unicode case folding
fn note_contains(conn: &Connection, candidate: &Candidate, needle: &str) -> StoreResult<bool> {
    if candidate.title.to_lowercase().contains(needle) {
        return Ok(true);
    }
    let (blocks, _) = load_blocks(conn, candidate.id)?;
    Ok(blocks
        .iter()
        .flat_map(|b| b.searchable_text())
        .any(|text| text.to_lowercase().contains(needle)))
}

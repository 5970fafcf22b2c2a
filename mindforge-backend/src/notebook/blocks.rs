//! Block rows: writing a note's block sequence and reading it back.
//!
//! Both directions are lenient. A block that fails its checks on write is
//! left out and the remaining blocks close ranks, so stored positions are
//! always `0..n`. A stored row that cannot be decoded on read is skipped and
//! reported as a [`BlockDiagnostic`].

use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::str::FromStr;

use crate::error::StoreResult;
use crate::models::{Block, BlockDiagnostic, BlockItem, BlockType};

/// A `blocks` row before it is decoded
struct StoredBlock {
    id: String,
    block_type: String,
    content: Option<String>,
    items_json: Option<String>,
    level: i64,
    position: i64,
}

/// Insert `blocks` for `note_id` at positions `0..n`, skipping malformed
/// blocks and repeated ids. Existing rows must already be cleared.
/// Returns the number of blocks written.
pub(crate) fn insert_blocks(conn: &Connection, note_id: i64, blocks: &[Block]) -> StoreResult<usize> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut insert = conn.prepare(
        "INSERT INTO blocks (id, note_id, type, content, items_json, level, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut taken_elsewhere = conn.prepare("SELECT EXISTS(SELECT 1 FROM blocks WHERE id = ?1)")?;

    let mut position: i64 = 0;
    for (index, block) in blocks.iter().enumerate() {
        if let Err(e) = block.validate() {
            log::warn!("[NOTES] Skipping block #{} of note {}: {}", index, note_id, e);
            continue;
        }
        if !seen.insert(block.id.as_str()) {
            log::warn!(
                "[NOTES] Skipping block #{} of note {}: duplicate id '{}'",
                index, note_id, block.id
            );
            continue;
        }
        let in_use: bool = taken_elsewhere.query_row([&block.id], |row| row.get(0))?;
        if in_use {
            log::warn!(
                "[NOTES] Skipping block #{} of note {}: id '{}' belongs to another note",
                index, note_id, block.id
            );
            continue;
        }

        let items_json = if block.block_type.is_list() {
            Some(serde_json::to_string(&block.items)?)
        } else {
            None
        };

        insert.execute(params![
            block.id,
            note_id,
            block.block_type.as_str(),
            block.content,
            items_json,
            block.level,
            position,
        ])?;
        position += 1;
    }

    Ok(position as usize)
}

/// Load a note's blocks in stored order, plus a diagnostic for each row that
/// had to be skipped
pub(crate) fn load_blocks(conn: &Connection, note_id: i64) -> StoreResult<(Vec<Block>, Vec<BlockDiagnostic>)> {
    let mut stmt = conn.prepare(
        "SELECT id, type, content, items_json, level, position
         FROM blocks WHERE note_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map([note_id], |row| {
            Ok(StoredBlock {
                id: row.get(0)?,
                block_type: row.get(1)?,
                content: row.get(2)?,
                items_json: row.get(3)?,
                level: row.get(4)?,
                position: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut blocks = Vec::with_capacity(rows.len());
    let mut diagnostics = Vec::new();
    for stored in rows {
        match decode(&stored) {
            Ok(block) => blocks.push(block),
            Err(reason) => {
                log::warn!(
                    "[NOTES] Skipping stored block '{}' of note {} at position {}: {}",
                    stored.id, note_id, stored.position, reason
                );
                diagnostics.push(BlockDiagnostic {
                    block_id: stored.id,
                    position: stored.position,
                    reason,
                });
            }
        }
    }
    Ok((blocks, diagnostics))
}

fn decode(stored: &StoredBlock) -> Result<Block, String> {
    let block_type = BlockType::from_str(&stored.block_type)
        .map_err(|_| format!("unknown block type '{}'", stored.block_type))?;

    let items: Vec<BlockItem> = match stored.items_json.as_deref() {
        Some(json) if block_type.is_list() => {
            serde_json::from_str(json).map_err(|e| format!("unreadable items: {}", e))?
        }
        _ => Vec::new(),
    };

    let block = Block {
        id: stored.id.clone(),
        block_type,
        content: stored.content.clone().unwrap_or_default(),
        items,
        level: stored.level,
    };
    block.validate().map_err(|e| e.to_string())?;
    Ok(block)
}

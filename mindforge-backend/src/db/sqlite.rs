//! SQLite connection pool and schema.
//!
//! Every operation checks out one pooled connection and hands it back when
//! the guard drops, on success and on error alike. Foreign keys are switched
//! on for every connection so cascades in the schema are enforced by SQLite.

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::defaults;
use crate::error::StoreResult;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Bumped whenever the table layout below changes
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS topics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        parent_id INTEGER REFERENCES topics (id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL CHECK (LENGTH(TRIM(title)) > 0),
        topic_id INTEGER REFERENCES topics (id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS note_tags (
        note_id INTEGER NOT NULL REFERENCES notes (id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags (id) ON DELETE CASCADE,
        PRIMARY KEY (note_id, tag_id)
    );

    CREATE TABLE IF NOT EXISTS blocks (
        id TEXT PRIMARY KEY,
        note_id INTEGER NOT NULL REFERENCES notes (id) ON DELETE CASCADE,
        type TEXT NOT NULL,
        content TEXT,
        items_json TEXT,
        level INTEGER NOT NULL DEFAULT 1 CHECK (level BETWEEN 1 AND 6),
        position INTEGER NOT NULL CHECK (position >= 0),
        UNIQUE (note_id, position)
    );

    CREATE INDEX IF NOT EXISTS idx_blocks_note_id ON blocks (note_id);
    CREATE INDEX IF NOT EXISTS idx_notes_topic_id ON notes (topic_id);
    CREATE INDEX IF NOT EXISTS idx_notes_updated_at ON notes (updated_at);
    CREATE INDEX IF NOT EXISTS idx_topics_parent_id ON topics (parent_id);
    CREATE INDEX IF NOT EXISTS idx_note_tags_tag_id ON note_tags (tag_id);
";

/// Pooled handle to the notes database
pub struct Database {
    pool: DbPool,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database file at `database_url`
    pub fn new(database_url: &str) -> StoreResult<Self> {
        Self::with_pool_size(database_url, defaults::DB_POOL_SIZE)
    }

    pub fn with_pool_size(database_url: &str, pool_size: u32) -> StoreResult<Self> {
        let path = PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(Duration::from_secs(5))?;
            Ok(())
        });

        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)?;

        let db = Self { pool, path };
        db.init_tables()?;

        log::info!("[DB] Opened {} (pool size {})", db.path.display(), pool_size.max(1));
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check out a connection; it returns to the pool when dropped
    pub fn conn(&self) -> StoreResult<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run `f` inside one transaction. The transaction commits only if `f`
    /// returns `Ok`; any error rolls back every statement `f` executed.
    pub fn transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn init_tables(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            log::info!("[DB] Schema stamped at version {}", SCHEMA_VERSION);
        }
        Ok(())
    }
}

/// Current time in the stored timestamp format
pub fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}

/// Fixed microsecond precision keeps lexical order equal to time order
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read a timestamp column, surfacing malformed text as a conversion error
pub fn timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Whether a row with `id` exists in `table`
pub(crate) fn row_exists(conn: &Connection, table: &str, id: i64) -> rusqlite::Result<bool> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table);
    conn.query_row(&sql, [id], |row| row.get(0))
}

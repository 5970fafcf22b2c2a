pub mod sqlite;

pub use sqlite::{format_timestamp, now_timestamp, timestamp_column, Database, DbConn, DbPool};
pub(crate) use sqlite::row_exists;

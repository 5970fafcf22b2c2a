//! Notebook stores: topics, notes with their blocks, tags and search.
//!
//! Each store holds a shared [`Database`](crate::db::Database) handle and
//! checks out one pooled connection per call.

mod blocks;
mod notes;
mod search;
mod tags;
mod topics;
mod tree;

pub mod seed;

pub use notes::NoteStore;
pub use search::SearchIndex;
pub use tags::TagIndex;
pub use topics::TopicStore;
pub use tree::TopicTree;

use crate::error::{StoreError, StoreResult};

/// Log a storage failure before it leaves a store. Validation and lookup
/// errors are returned as they are.
fn log_storage_failure<T>(action: &str, result: StoreResult<T>) -> StoreResult<T> {
    if let Err(StoreError::Storage(e)) = &result {
        log::error!("Failed to {}: {}", action, e);
    }
    result
}

//! Persistence core for a personal notebook: a topic tree, notes made of
//! ordered typed blocks, tags, and substring search, stored in SQLite.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notebook;

pub use error::{StoreError, StoreResult};

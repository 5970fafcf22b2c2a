//! Plain data records exchanged with the presentation layer, plus the
//! structural checks each one must pass before it is persisted.

mod block;
mod note;
mod search;
mod tag;
mod topic;

pub use block::{Block, BlockItem, BlockType, MAX_HEADING_LEVEL, MIN_HEADING_LEVEL};
pub use note::{validate_title, validate_topic_ref, BlockDiagnostic, Note, NoteHeader, NOTE_TITLE_MAX_LENGTH};
pub use search::NoteSummary;
pub use tag::{normalize_tag, validate_tag, TagUsage};
pub use topic::{validate_topic_name, Topic, TopicDeletion, TOPIC_NAME_MAX_LENGTH};

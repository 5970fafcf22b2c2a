use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One note matched by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: i64,
    pub title: String,
    pub topic_name: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

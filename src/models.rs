use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ===== Directory =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Channel {
    pub id: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

// ===== Archived content =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub ts: String,
    pub channel: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reply {
    pub ts: String,
    pub parent_ts: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

// ===== Ingestion progress =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChannelBackfillState {
    pub channel: String,
    /// Oldest timestamp still to fetch; starts at the configured cutoff.
    pub cursor_ts: String,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ReplyQueueEntry {
    pub parent_ts: String,
    pub channel: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Row counts describing how far ingestion has progressed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackfillProgress {
    pub members: i64,
    pub channels: i64,
    pub channels_pending: i64,
    pub channels_completed: i64,
    pub messages: i64,
    pub replies: i64,
    pub reply_queue_pending: i64,
    pub reply_queue_completed: i64,
}

// ===== API wrappers =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

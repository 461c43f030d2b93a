//! Persistence contract consumed by the ingestion engine.
//!
//! Two write modes are deliberately distinct:
//! - update-or-create (`upsert_*`) for directory entries and live-ingested
//!   content, so edits are reflected;
//! - insert-or-skip (`insert_*`, `enqueue_reply_fetches`) for everything
//!   backfill discovers, so backfill never clobbers a newer live copy.
//!
//! Every call is its own atomic unit; nothing spans entities.

use crate::models::{BackfillProgress, ChannelBackfillState, ReplyQueueEntry};
use crate::slack::{DirectoryEntry, SlackMessage};
use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx;

#[rocket::async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Update-or-create members by id. Returns the number of rows written.
    async fn upsert_members(
        &self,
        entries: &[DirectoryEntry],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>;

    /// Update-or-create channels by id. Returns the number of rows written.
    async fn upsert_channels(
        &self,
        entries: &[DirectoryEntry],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>;

    /// Create a backfill state at `cutoff_ts` for every channel lacking one.
    /// Existing states are left untouched. Returns how many were created.
    async fn ensure_channel_backfill(
        &self,
        channels: &[String],
        cutoff_ts: &str,
    ) -> Result<u64, sqlx::Error>;

    /// Update-or-create a live message, routed to replies when it belongs to a thread.
    async fn upsert_live_message(
        &self,
        channel: &str,
        message: &SlackMessage,
        updated_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    /// Insert-or-skip messages keyed by (ts, channel). Returns rows inserted.
    async fn insert_messages(
        &self,
        channel: &str,
        messages: &[SlackMessage],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>;

    /// Insert-or-skip replies keyed by (ts, parent_ts). Returns rows inserted.
    ///
    /// Callers must already have removed the thread root itself.
    async fn insert_replies(
        &self,
        parent_ts: &str,
        replies: &[SlackMessage],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>;

    /// Insert-or-skip reply-fetch queue entries. Returns rows inserted.
    async fn enqueue_reply_fetches(
        &self,
        channel: &str,
        parent_ts: &[String],
    ) -> Result<u64, sqlx::Error>;

    async fn pending_channel_backfills(&self) -> Result<Vec<ChannelBackfillState>, sqlx::Error>;

    async fn advance_channel_backfill(
        &self,
        channel: &str,
        cursor_ts: &str,
    ) -> Result<(), sqlx::Error>;

    async fn complete_channel_backfill(
        &self,
        channel: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    async fn pending_reply_fetches(&self) -> Result<Vec<ReplyQueueEntry>, sqlx::Error>;

    async fn complete_reply_fetch(
        &self,
        parent_ts: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    async fn progress(&self) -> Result<BackfillProgress, sqlx::Error>;
}

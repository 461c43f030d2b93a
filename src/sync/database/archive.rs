//! PostgreSQL implementation of [`ArchiveStore`].
//!
//! Bulk writes bind columnar arrays and expand them with `UNNEST`, so each
//! page of backfill is a single statement per table.

use crate::models::{BackfillProgress, ChannelBackfillState, ReplyQueueEntry};
use crate::slack::{DirectoryEntry, SlackMessage};
use crate::sync::store::ArchiveStore;
use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, PgPool};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone)]
pub struct PgArchiveStore {
    pool: PgPool,
}

impl PgArchiveStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn upsert_directory(
        &self,
        table: DirectoryTable,
        entries: &[DirectoryEntry],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        if entries.is_empty() {
            return Ok(0);
        }

        // ON CONFLICT DO UPDATE rejects a key appearing twice in one statement;
        // keep the last occurrence of each id.
        let mut latest: HashMap<&str, &Value> = HashMap::with_capacity(entries.len());
        let mut order = Vec::with_capacity(entries.len());
        for entry in entries {
            if latest.insert(entry.id.as_str(), &entry.data).is_none() {
                order.push(entry.id.as_str());
            }
        }

        let ids: Vec<String> = order.iter().map(|id| id.to_string()).collect();
        let data: Vec<Value> = order.iter().map(|id| latest[id].clone()).collect();

        let sql = format!(
            r#"INSERT INTO {table} (id, data, updated_at)
               SELECT id, data, $3
               FROM UNNEST($1::text[], $2::jsonb[]) AS t(id, data)
               ON CONFLICT (id) DO UPDATE
               SET data = EXCLUDED.data,
                   updated_at = EXCLUDED.updated_at"#,
            table = table.name()
        );

        let result = sqlx::query(&sql)
            .bind(&ids)
            .bind(&data)
            .bind(updated_at)
            .execute(&self.pool)
            .await?;

        log::trace!("upserted {} rows into {}", result.rows_affected(), table.name());
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Copy)]
enum DirectoryTable {
    Members,
    Channels,
}

impl DirectoryTable {
    fn name(self) -> &'static str {
        match self {
            DirectoryTable::Members => "slack_users",
            DirectoryTable::Channels => "slack_channels",
        }
    }
}

fn columns(messages: &[SlackMessage]) -> (Vec<String>, Vec<Value>) {
    messages
        .iter()
        .map(|message| (message.ts.clone(), message.data.clone()))
        .unzip()
}

#[rocket::async_trait]
impl ArchiveStore for PgArchiveStore {
    async fn upsert_members(
        &self,
        entries: &[DirectoryEntry],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        self.upsert_directory(DirectoryTable::Members, entries, updated_at)
            .await
    }

    async fn upsert_channels(
        &self,
        entries: &[DirectoryEntry],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        self.upsert_directory(DirectoryTable::Channels, entries, updated_at)
            .await
    }

    async fn ensure_channel_backfill(
        &self,
        channels: &[String],
        cutoff_ts: &str,
    ) -> Result<u64, sqlx::Error> {
        if channels.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"INSERT INTO channel_backfill_state (channel, cursor_ts, completed_at)
               SELECT channel, $2, NULL
               FROM UNNEST($1::text[]) AS t(channel)
               ON CONFLICT (channel) DO NOTHING"#,
        )
        .bind(channels)
        .bind(cutoff_ts)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_live_message(
        &self,
        channel: &str,
        message: &SlackMessage,
        updated_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        if message.is_thread_reply() {
            sqlx::query(
                r#"INSERT INTO slack_replies (ts, parent_ts, data, updated_at)
                   VALUES ($1, $2, $3, $4)
                   ON CONFLICT (ts, parent_ts) DO UPDATE
                   SET data = EXCLUDED.data,
                       updated_at = EXCLUDED.updated_at"#,
            )
            .bind(&message.ts)
            .bind(message.parent_ts())
            .bind(&message.data)
            .bind(updated_at)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"INSERT INTO slack_messages (ts, channel, data, updated_at)
                   VALUES ($1, $2, $3, $4)
                   ON CONFLICT (ts, channel) DO UPDATE
                   SET data = EXCLUDED.data,
                       updated_at = EXCLUDED.updated_at"#,
            )
            .bind(&message.ts)
            .bind(channel)
            .bind(&message.data)
            .bind(updated_at)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn insert_messages(
        &self,
        channel: &str,
        messages: &[SlackMessage],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        if messages.is_empty() {
            return Ok(0);
        }

        let (ts, data) = columns(messages);
        let result = sqlx::query(
            r#"INSERT INTO slack_messages (ts, channel, data, updated_at)
               SELECT ts, $2, data, $4
               FROM UNNEST($1::text[], $3::jsonb[]) AS t(ts, data)
               ON CONFLICT (ts, channel) DO NOTHING"#,
        )
        .bind(&ts)
        .bind(channel)
        .bind(&data)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected();
        if inserted < messages.len() as u64 {
            log::debug!(
                "insert_messages: {} of {} messages for {} already archived",
                messages.len() as u64 - inserted,
                messages.len(),
                channel
            );
        }
        Ok(inserted)
    }

    async fn insert_replies(
        &self,
        parent_ts: &str,
        replies: &[SlackMessage],
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        if replies.is_empty() {
            return Ok(0);
        }

        let (ts, data) = columns(replies);
        let result = sqlx::query(
            r#"INSERT INTO slack_replies (ts, parent_ts, data, updated_at)
               SELECT ts, $2, data, $4
               FROM UNNEST($1::text[], $3::jsonb[]) AS t(ts, data)
               WHERE ts <> $2
               ON CONFLICT (ts, parent_ts) DO NOTHING"#,
        )
        .bind(&ts)
        .bind(parent_ts)
        .bind(&data)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn enqueue_reply_fetches(
        &self,
        channel: &str,
        parent_ts: &[String],
    ) -> Result<u64, sqlx::Error> {
        if parent_ts.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"INSERT INTO reply_fetch_queue (parent_ts, channel)
               SELECT parent_ts, $2
               FROM UNNEST($1::text[]) AS t(parent_ts)
               ON CONFLICT (parent_ts) DO NOTHING"#,
        )
        .bind(parent_ts)
        .bind(channel)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn pending_channel_backfills(&self) -> Result<Vec<ChannelBackfillState>, sqlx::Error> {
        sqlx::query_as::<_, ChannelBackfillState>(
            r#"SELECT channel, cursor_ts, completed_at
               FROM channel_backfill_state
               WHERE completed_at IS NULL
               ORDER BY channel"#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn advance_channel_backfill(
        &self,
        channel: &str,
        cursor_ts: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE channel_backfill_state SET cursor_ts = $1, completed_at = NULL WHERE channel = $2",
        )
        .bind(cursor_ts)
        .bind(channel)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_channel_backfill(
        &self,
        channel: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE channel_backfill_state SET completed_at = $1 WHERE channel = $2")
            .bind(completed_at)
            .bind(channel)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn pending_reply_fetches(&self) -> Result<Vec<ReplyQueueEntry>, sqlx::Error> {
        sqlx::query_as::<_, ReplyQueueEntry>(
            r#"SELECT parent_ts, channel, created_at, completed_at
               FROM reply_fetch_queue
               WHERE completed_at IS NULL
               ORDER BY created_at, parent_ts"#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn complete_reply_fetch(
        &self,
        parent_ts: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE reply_fetch_queue SET completed_at = $1 WHERE parent_ts = $2")
            .bind(completed_at)
            .bind(parent_ts)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn progress(&self) -> Result<BackfillProgress, sqlx::Error> {
        sqlx::query_as::<_, BackfillProgress>(
            r#"
            SELECT
                CAST((SELECT COUNT(*) FROM slack_users) AS BIGINT) AS members,
                CAST((SELECT COUNT(*) FROM slack_channels) AS BIGINT) AS channels,
                CAST((SELECT COUNT(*) FROM channel_backfill_state WHERE completed_at IS NULL) AS BIGINT) AS channels_pending,
                CAST((SELECT COUNT(*) FROM channel_backfill_state WHERE completed_at IS NOT NULL) AS BIGINT) AS channels_completed,
                CAST((SELECT COUNT(*) FROM slack_messages) AS BIGINT) AS messages,
                CAST((SELECT COUNT(*) FROM slack_replies) AS BIGINT) AS replies,
                CAST((SELECT COUNT(*) FROM reply_fetch_queue WHERE completed_at IS NULL) AS BIGINT) AS reply_queue_pending,
                CAST((SELECT COUNT(*) FROM reply_fetch_queue WHERE completed_at IS NOT NULL) AS BIGINT) AS reply_queue_completed
            "#,
        )
        .fetch_one(&self.pool)
        .await
    }
}

//! Backward walk over each channel's history, one page per channel per pass.

use crate::models::ChannelBackfillState;
use crate::slack::types::compare_ts;
use crate::slack::{HistoryPage, SlackApi, SlackMessage, Sleeper, Transport};
use crate::sync::error::ArchiveError;
use crate::sync::stats::ChannelBackfillReport;
use crate::sync::store::ArchiveStore;
use chrono::Utc;
use std::collections::BTreeMap;

/// Where a channel stands after one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStep {
    /// More history remains; the cursor moved to this timestamp.
    Advanced(String),
    /// The remote reported no further pages.
    Completed,
    /// The page claimed more history but could not move the cursor; nothing
    /// was changed.
    Stalled,
    /// The fetch failed; nothing was changed and the channel is retried next pass.
    Failed,
}

/// Messages of one history page, grouped the way they are persisted.
#[derive(Debug, Default)]
struct PageWrites {
    messages: Vec<SlackMessage>,
    replies: BTreeMap<String, Vec<SlackMessage>>,
    parents: Vec<String>,
}

impl PageWrites {
    fn from_page(page: &HistoryPage) -> Self {
        let mut writes = PageWrites::default();
        for message in &page.messages {
            let parent = message.parent_ts().to_string();
            if message.is_thread_reply() {
                writes
                    .replies
                    .entry(parent.clone())
                    .or_default()
                    .push(message.clone());
            } else {
                writes.messages.push(message.clone());
            }
            if !writes.parents.contains(&parent) {
                writes.parents.push(parent);
            }
        }
        writes
    }
}

pub struct ChannelBackfillEngine<'a, S, T, P> {
    store: &'a S,
    api: &'a SlackApi<T, P>,
}

impl<'a, S, T, P> ChannelBackfillEngine<'a, S, T, P>
where
    S: ArchiveStore,
    T: Transport,
    P: Sleeper,
{
    pub fn new(store: &'a S, api: &'a SlackApi<T, P>) -> Self {
        Self { store, api }
    }

    /// Advance every unfinished channel by one page, sequentially.
    pub async fn run(&self) -> Result<ChannelBackfillReport, ArchiveError> {
        let pending = self.store.pending_channel_backfills().await?;
        log::info!("backfill: {} channels to backfill", pending.len());

        let mut report = ChannelBackfillReport::default();
        for state in &pending {
            report.channels_visited += 1;
            match self.backfill_channel(state, &mut report).await? {
                ChannelStep::Completed => report.channels_completed += 1,
                ChannelStep::Failed => report.channels_failed += 1,
                ChannelStep::Stalled => report.channels_stalled += 1,
                ChannelStep::Advanced(_) => {}
            }
        }

        Ok(report)
    }

    /// Fetch and persist one page of `state.channel`'s history, then move its cursor.
    pub async fn backfill_channel(
        &self,
        state: &ChannelBackfillState,
        report: &mut ChannelBackfillReport,
    ) -> Result<ChannelStep, ArchiveError> {
        let channel = state.channel.as_str();
        let cursor = state.cursor_ts.as_str();

        let fetched = self
            .api
            .with_membership(channel, &mut report.joins, || {
                self.api.channel_history(channel, cursor)
            })
            .await;
        let page = match fetched {
            Ok(page) => page,
            Err(err) => {
                log::warn!("backfill: history for {} failed at {}: {}", channel, cursor, err);
                return Ok(ChannelStep::Failed);
            }
        };

        log::info!(
            "backfill: fetched {} messages for {} before {} (has_more: {})",
            page.messages.len(),
            channel,
            cursor,
            page.has_more
        );
        if page.skipped > 0 {
            log::warn!("backfill: dropped {} messages without ts in {}", page.skipped, channel);
        }

        let writes = PageWrites::from_page(&page);
        let updated_at = Utc::now();

        report.messages_inserted += self
            .store
            .insert_messages(channel, &writes.messages, updated_at)
            .await?;
        for (parent_ts, replies) in &writes.replies {
            report.replies_inserted += self
                .store
                .insert_replies(parent_ts, replies, updated_at)
                .await?;
        }
        report.parents_enqueued += self
            .store
            .enqueue_reply_fetches(channel, &writes.parents)
            .await?;

        if !page.has_more {
            self.store
                .complete_channel_backfill(channel, Utc::now())
                .await?;
            log::info!("backfill: channel {} complete", channel);
            return Ok(ChannelStep::Completed);
        }

        match page.oldest_ts() {
            Some(oldest) if compare_ts(oldest, cursor).is_lt() => {
                self.store.advance_channel_backfill(channel, oldest).await?;
                Ok(ChannelStep::Advanced(oldest.to_string()))
            }
            Some(oldest) => {
                log::warn!(
                    "backfill: {} reported more history but its oldest message {} does not precede {}",
                    channel,
                    oldest,
                    cursor
                );
                Ok(ChannelStep::Stalled)
            }
            None => {
                log::warn!(
                    "backfill: {} reported more history but returned no messages at {}",
                    channel,
                    cursor
                );
                Ok(ChannelStep::Stalled)
            }
        }
    }
}

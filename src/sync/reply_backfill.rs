//! Drains the reply-fetch queue filled by channel backfill.

use crate::slack::{Fetched, SlackApi, SlackMessage, Sleeper, Transport};
use crate::sync::error::ArchiveError;
use crate::sync::stats::ReplyBackfillReport;
use crate::sync::store::ArchiveStore;
use chrono::Utc;

pub struct ThreadReplyBackfillEngine<'a, S, T, P> {
    store: &'a S,
    api: &'a SlackApi<T, P>,
}

impl<'a, S, T, P> ThreadReplyBackfillEngine<'a, S, T, P>
where
    S: ArchiveStore,
    T: Transport,
    P: Sleeper,
{
    pub fn new(store: &'a S, api: &'a SlackApi<T, P>) -> Self {
        Self { store, api }
    }

    /// Fetch replies for every open queue entry, in queue order.
    ///
    /// The first fetch failure ends the drain for this pass. Unclosed entries
    /// are picked up by the next pass.
    pub async fn run(&self) -> Result<ReplyBackfillReport, ArchiveError> {
        let queue = self.store.pending_reply_fetches().await?;
        log::info!("replies: {} parent messages to backfill replies", queue.len());

        let mut report = ReplyBackfillReport::default();
        for entry in &queue {
            let fetched = self
                .api
                .with_membership(&entry.channel, &mut report.joins, || {
                    self.api.thread_replies(&entry.channel, &entry.parent_ts)
                })
                .await;
            let fetched = match fetched {
                Ok(fetched) => fetched,
                Err(err) => {
                    log::warn!(
                        "replies: fetching {} in {} failed, stopping for this pass: {}",
                        entry.parent_ts,
                        entry.channel,
                        err
                    );
                    report.aborted = true;
                    break;
                }
            };

            match fetched {
                Fetched::Data(messages) => {
                    let replies = without_parent(messages, &entry.parent_ts);
                    log::debug!(
                        "replies: fetched {} replies for {} in {}",
                        replies.len(),
                        entry.parent_ts,
                        entry.channel
                    );
                    report.replies_inserted += self
                        .store
                        .insert_replies(&entry.parent_ts, &replies, Utc::now())
                        .await?;
                    report.threads_completed += 1;
                }
                Fetched::Missing => {
                    log::debug!(
                        "replies: thread {} in {} no longer exists",
                        entry.parent_ts,
                        entry.channel
                    );
                    report.threads_missing += 1;
                }
            }

            self.store
                .complete_reply_fetch(&entry.parent_ts, Utc::now())
                .await?;
        }

        Ok(report)
    }
}

/// Drop the thread root, which the remote lists first among its own replies.
fn without_parent(messages: Vec<SlackMessage>, parent_ts: &str) -> Vec<SlackMessage> {
    messages
        .into_iter()
        .filter(|message| message.ts != parent_ts)
        .collect()
}

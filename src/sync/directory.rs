//! Member and channel directory refresh.

use crate::slack::{Collected, DirectoryEntry, SlackApi, Sleeper, Transport};
use crate::sync::config::SyncConfig;
use crate::sync::error::ArchiveError;
use crate::sync::stats::DirectoryReport;
use crate::sync::store::ArchiveStore;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// When each directory list was last fully refreshed by this process.
///
/// Held by the scheduler and passed into every pass; a fresh process starts
/// with both lists due.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryFreshness {
    pub members_synced_at: Option<DateTime<Utc>>,
    pub channels_synced_at: Option<DateTime<Utc>>,
}

impl DirectoryFreshness {
    pub fn members_due(&self, now: DateTime<Utc>, window: Duration) -> bool {
        is_due(self.members_synced_at, now, window)
    }

    pub fn channels_due(&self, now: DateTime<Utc>, window: Duration) -> bool {
        is_due(self.channels_synced_at, now, window)
    }
}

fn is_due(last: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    match last {
        None => true,
        // A negative elapsed time (clock stepped back) is not due.
        Some(last) => (now - last).to_std().map(|elapsed| elapsed > window).unwrap_or(false),
    }
}

fn entries_from(collected: Collected, kind: &str) -> Vec<DirectoryEntry> {
    let total = collected.items.len();
    let entries: Vec<DirectoryEntry> = collected
        .items
        .into_iter()
        .filter_map(DirectoryEntry::from_value)
        .collect();
    if entries.len() < total {
        log::warn!("directory: dropped {} {} without id", total - entries.len(), kind);
    }
    entries
}

pub struct DirectorySyncJob<'a, S, T, P> {
    store: &'a S,
    api: &'a SlackApi<T, P>,
    config: &'a SyncConfig,
}

impl<'a, S, T, P> DirectorySyncJob<'a, S, T, P>
where
    S: ArchiveStore,
    T: Transport,
    P: Sleeper,
{
    pub fn new(store: &'a S, api: &'a SlackApi<T, P>, config: &'a SyncConfig) -> Self {
        Self { store, api, config }
    }

    /// Refresh whichever lists are older than the freshness window.
    ///
    /// A list is marked fresh only when every page was fetched; a truncated
    /// listing still upserts what it got and is retried next pass.
    pub async fn run(
        &self,
        freshness: &mut DirectoryFreshness,
        now: DateTime<Utc>,
    ) -> Result<DirectoryReport, ArchiveError> {
        let mut report = DirectoryReport::default();
        let window = self.config.directory_refresh;

        if freshness.members_due(now, window) {
            log::info!(
                "directory: fetching members, last synced {:?}",
                freshness.members_synced_at
            );
            let collected = self.api.list_members().await;
            let complete = collected.is_complete();
            let entries = entries_from(collected, "members");

            report.members_refreshed = true;
            report.members = self.store.upsert_members(&entries, Utc::now()).await?;
            if complete {
                freshness.members_synced_at = Some(now);
            } else {
                report.interrupted += 1;
            }
            log::info!("directory: upserted {} members", report.members);
        }

        if freshness.channels_due(now, window) {
            log::info!(
                "directory: fetching channels, last synced {:?}",
                freshness.channels_synced_at
            );
            let collected = self.api.list_channels().await;
            let complete = collected.is_complete();
            let entries = entries_from(collected, "channels");

            report.channels_refreshed = true;
            report.channels = self.store.upsert_channels(&entries, Utc::now()).await?;

            let ids: Vec<String> = entries.iter().map(|entry| entry.id.clone()).collect();
            report.backfills_seeded = self
                .store
                .ensure_channel_backfill(&ids, &self.config.backfill_cutoff_ts)
                .await?;

            if complete {
                freshness.channels_synced_at = Some(now);
            } else {
                report.interrupted += 1;
            }
            log::info!(
                "directory: upserted {} channels, seeded {} backfills",
                report.channels,
                report.backfills_seeded
            );
        }

        Ok(report)
    }
}

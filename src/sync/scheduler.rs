use crate::slack::{SlackApi, Sleeper, Transport};
use crate::sync::channel_backfill::ChannelBackfillEngine;
use crate::sync::config::SyncConfig;
use crate::sync::directory::{DirectoryFreshness, DirectorySyncJob};
use crate::sync::error::ArchiveError;
use crate::sync::reply_backfill::ThreadReplyBackfillEngine;
use crate::sync::stats::PassReport;
use crate::sync::store::ArchiveStore;
use chrono::{DateTime, Utc};
use std::convert::Infallible;

/// Single control loop driving ingestion: run a pass, sleep, repeat.
///
/// Everything within a pass is sequential so the workspace's global rate limit
/// is only ever contended by one request at a time.
pub struct Scheduler<S, T, P> {
    store: S,
    api: SlackApi<T, P>,
    config: SyncConfig,
    freshness: DirectoryFreshness,
}

impl<S, T, P> Scheduler<S, T, P>
where
    S: ArchiveStore,
    T: Transport,
    P: Sleeper,
{
    pub fn new(store: S, api: SlackApi<T, P>, config: SyncConfig) -> Self {
        Self {
            store,
            api,
            config,
            freshness: DirectoryFreshness::default(),
        }
    }

    pub fn freshness(&self) -> &DirectoryFreshness {
        &self.freshness
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Directory refresh, then one page per pending channel, then the reply queue.
    pub async fn run_pass(&mut self, now: DateTime<Utc>) -> Result<PassReport, ArchiveError> {
        let directory = DirectorySyncJob::new(&self.store, &self.api, &self.config)
            .run(&mut self.freshness, now)
            .await?;
        let channels = ChannelBackfillEngine::new(&self.store, &self.api)
            .run()
            .await?;
        let replies = ThreadReplyBackfillEngine::new(&self.store, &self.api)
            .run()
            .await?;

        Ok(PassReport {
            directory,
            channels,
            replies,
        })
    }

    /// Run passes forever. Only a store failure ends the loop, and it is
    /// returned to the caller as fatal.
    pub async fn run(mut self) -> Result<Infallible, ArchiveError> {
        log::info!(
            "scheduler: started, interval {:?}, cutoff {}",
            self.config.pass_interval,
            self.config.backfill_cutoff_ts
        );

        loop {
            log::info!("------------------");
            let report = self.run_pass(Utc::now()).await.map_err(|err| {
                log::error!("scheduler: pass failed: {}", err);
                err
            })?;
            log::info!("scheduler: pass complete: {}", report);

            self.api.sleeper().sleep(self.config.pass_interval).await;
        }
    }
}

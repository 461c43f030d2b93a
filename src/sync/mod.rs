//! Workspace archive ingestion.
//!
//! This module copies a chat workspace into PostgreSQL and keeps the copy
//! complete as history is walked backwards from a fixed cutoff.
//!
//! # Architecture Overview
//!
//! One [`Scheduler`] drives every pass sequentially:
//!
//! - **`directory`**: refreshes the member and channel directories when their
//!   freshness window has elapsed, and seeds a backfill state for every channel
//!   seen for the first time.
//!
//! - **`channel_backfill`**: fetches one page of history per pending channel,
//!   stores messages and thread replies with insert-or-skip semantics, enqueues
//!   thread parents and moves the channel cursor backwards.
//!
//! - **`reply_backfill`**: drains the reply-fetch queue in enqueue order and
//!   stops at the first failure so the entry is retried next pass.
//!
//! - **`store`**: the [`ArchiveStore`] seam. `database` holds the Postgres
//!   implementation and the embedded migrations.
//!
//! ## Write Semantics
//!
//! Backfilled rows never replace existing ones: rows written by the live path
//! always win. Directory rows are the exception and are upserted.

pub mod channel_backfill;
pub mod config;
pub mod database;
pub mod directory;
pub mod error;
pub mod reply_backfill;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use channel_backfill::ChannelBackfillEngine;
pub use config::SyncConfig;
pub use database::{MIGRATOR, PgArchiveStore, run_migrations};
pub use directory::{DirectoryFreshness, DirectorySyncJob};
pub use error::ArchiveError;
pub use reply_backfill::ThreadReplyBackfillEngine;
pub use scheduler::Scheduler;
pub use stats::{ChannelBackfillReport, DirectoryReport, PassReport, ReplyBackfillReport};
pub use store::ArchiveStore;

#[cfg(test)]
pub(crate) mod testing {
    use crate::slack::fetcher::testing::{RecordingSleeper, ScriptedTransport};
    use crate::slack::{SlackApi, SlackConfig};
    use std::time::Duration;

    /// API client over a scripted transport with the production paging limits.
    pub fn test_api(
        transport: &ScriptedTransport,
        sleeper: RecordingSleeper,
    ) -> SlackApi<ScriptedTransport, RecordingSleeper> {
        let config = SlackConfig {
            token: "xoxb-test".to_string(),
            base_url: "http://localhost".to_string(),
            request_timeout: Duration::from_secs(5),
            rate_limit_cooldown: Duration::from_secs(30),
            directory_page_limit: 200,
            history_page_limit: 500,
            replies_limit: 999,
        };
        SlackApi::new(transport.clone(), sleeper, &config)
    }
}

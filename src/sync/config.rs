use crate::slack::config::{lookup_string, lookup_u64};
use std::env;
use std::time::Duration;

/// Timestamp the channel backfill walks backward from on first contact.
pub const DEFAULT_BACKFILL_CUTOFF_TS: &str = "1681233252.216899";

/// Scheduling settings for the ingestion loop.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub backfill_cutoff_ts: String,
    /// Minimum age of the member/channel lists before they are fetched again.
    pub directory_refresh: Duration,
    /// Idle time between two passes.
    pub pass_interval: Duration,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            backfill_cutoff_ts: lookup_string(
                &lookup,
                "ARCHIVE_BACKFILL_CUTOFF_TS",
                DEFAULT_BACKFILL_CUTOFF_TS,
            ),
            directory_refresh: Duration::from_secs(lookup_u64(
                &lookup,
                "ARCHIVE_DIRECTORY_REFRESH_SECS",
                24 * 60 * 60,
            )),
            pass_interval: Duration::from_secs(lookup_u64(
                &lookup,
                "ARCHIVE_PASS_INTERVAL_SECS",
                10 * 60,
            )),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.backfill_cutoff_ts, DEFAULT_BACKFILL_CUTOFF_TS);
        assert_eq!(config.directory_refresh, Duration::from_secs(86_400));
        assert_eq!(config.pass_interval, Duration::from_secs(600));
    }

    #[test]
    fn reads_overrides() {
        let config = SyncConfig::from_lookup(|key| match key {
            "ARCHIVE_BACKFILL_CUTOFF_TS" => Some("1700000000.000100".to_string()),
            "ARCHIVE_PASS_INTERVAL_SECS" => Some("60".to_string()),
            _ => None,
        });
        assert_eq!(config.backfill_cutoff_ts, "1700000000.000100");
        assert_eq!(config.pass_interval, Duration::from_secs(60));
        assert_eq!(config.directory_refresh, Duration::from_secs(86_400));
    }
}

use crate::slack::ConfigError;
use rocket_db_pools::sqlx;
use thiserror::Error;

/// Failures that end an ingestion pass or keep ingestion from starting.
///
/// Remote API failures never appear here; each job absorbs them according to
/// its own policy. What remains is fatal to the scheduler.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket_db_pools::sqlx::migrate::MigrateError;

    #[test]
    fn startup_failures_convert_into_archive_errors() {
        let err: ArchiveError = ConfigError::Missing("SLACK_TOKEN").into();
        assert!(matches!(err, ArchiveError::Config(ConfigError::Missing("SLACK_TOKEN"))));
        assert_eq!(err.to_string(), "SLACK_TOKEN is required");

        let err: ArchiveError = MigrateError::VersionMissing(20250412000000).into();
        assert!(matches!(err, ArchiveError::Migration(_)));
        assert!(err.to_string().starts_with("migration error"));
    }
}

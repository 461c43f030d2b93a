//! Database access for the ingestion engine: migrations and the Postgres
//! implementation of the archive store.

pub mod archive;
pub mod migration;

pub use archive::PgArchiveStore;
pub use migration::{MIGRATOR, run_migrations};

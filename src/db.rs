use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("archive_db")]
pub struct ArchiveDb(sqlx::PgPool);

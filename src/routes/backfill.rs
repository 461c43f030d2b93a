//! Read-only view of ingestion progress.

use crate::error::ApiError;
use crate::models::{BackfillProgress, DataResponse};
use crate::sync::{ArchiveStore, PgArchiveStore};
use rocket::State;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::openapi;

/// Row counts for the archive tables and the state of both backfill queues.
#[openapi(tag = "Admin")]
#[get("/admin/backfill/status")]
pub async fn backfill_status(
    pool: &State<PgPool>,
) -> Result<Json<DataResponse<BackfillProgress>>, ApiError> {
    let store = PgArchiveStore::new(pool.inner().clone());
    let progress = store.progress().await?;
    Ok(Json(DataResponse { data: progress }))
}

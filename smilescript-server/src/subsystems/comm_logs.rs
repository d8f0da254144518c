//! Communication log operations: create, list and regenerate summaries.

use chrono::Utc;
use smilescript_core::{CommLog, Summarizer};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommLogError {
    #[error("Transcript cannot be empty")]
    EmptyTranscript,

    #[error("Communication log with id {0} not found")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

const SELECT_COLUMNS: &str = "id, transcript, summary, created_at, updated_at";

/// Summarize `transcript` and store it as a new record.
pub async fn create_comm_log(
    transcript: String,
    pool: &SqlitePool,
    summarizer: &Summarizer,
) -> Result<CommLog, CommLogError> {
    if transcript.trim().is_empty() {
        return Err(CommLogError::EmptyTranscript);
    }

    let summary = summarizer.summarize(&transcript).await;
    let now = Utc::now();

    let log: CommLog = sqlx::query_as(&format!(
        "INSERT INTO comm_logs (transcript, summary, created_at, updated_at) \
         VALUES ($1, $2, $3, $3) RETURNING {}",
        SELECT_COLUMNS
    ))
    .bind(&transcript)
    .bind(&summary)
    .bind(now)
    .fetch_one(pool)
    .await?;

    tracing::info!(id = log.id, remote = summarizer.is_remote(), "Stored new communication log");
    Ok(log)
}

/// All records, newest first.
pub async fn list_comm_logs(pool: &SqlitePool) -> Result<Vec<CommLog>, CommLogError> {
    let logs = sqlx::query_as(&format!(
        "SELECT {} FROM comm_logs ORDER BY created_at DESC, id DESC",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

pub async fn get_comm_log(id: i64, pool: &SqlitePool) -> Result<CommLog, CommLogError> {
    sqlx::query_as(&format!("SELECT {} FROM comm_logs WHERE id = $1", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(CommLogError::NotFound(id))
}

/// Re-summarize the stored transcript of record `id` and overwrite its summary.
///
/// The provider call happens outside the write transaction; `updated_at` is
/// computed from the row as it stands when the update is applied. The
/// transaction takes the write lock up front (`BEGIN IMMEDIATE`) so concurrent
/// regenerates wait on the busy timeout instead of failing on lock upgrade.
pub async fn regenerate_summary(
    id: i64,
    pool: &SqlitePool,
    summarizer: &Summarizer,
) -> Result<CommLog, CommLogError> {
    let existing = get_comm_log(id, pool).await?;
    let summary = summarizer.summarize(&existing.transcript).await;

    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let current: CommLog =
        sqlx::query_as(&format!("SELECT {} FROM comm_logs WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(CommLogError::NotFound(id))?;

    let updated_at = current.next_updated_at(Utc::now());

    let log: CommLog = sqlx::query_as(&format!(
        "UPDATE comm_logs SET summary = $1, updated_at = $2 WHERE id = $3 RETURNING {}",
        SELECT_COLUMNS
    ))
    .bind(&summary)
    .bind(updated_at)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(id = log.id, remote = summarizer.is_remote(), "Regenerated summary");
    Ok(log)
}

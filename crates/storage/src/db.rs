use agency_core::{Direction, Money, PostedDate, ReviewStatus};
use agency_import::StatementExtraction;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Invalid posting date: {0}")]
    InvalidDate(String),
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),
    #[error("Import batch not found: {0}")]
    BatchNotFound(i64),
    #[error("Import batch {0} is not being processed")]
    BatchNotProcessing(i64),
    #[error("Statement transaction {0} not found or already reviewed")]
    NotReviewable(i64),
    #[error("Review must promote or discard, got '{0}'")]
    InvalidReview(ReviewStatus),
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportStatus::Processing => write!(f, "processing"),
            ImportStatus::Completed => write!(f, "completed"),
            ImportStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ImportStatus::Processing),
            "completed" => Ok(ImportStatus::Completed),
            "failed" => Ok(ImportStatus::Failed),
            other => Err(format!("Unknown import status: '{other}'")),
        }
    }
}

/// One uploaded statement file.
#[derive(Debug, Clone, Serialize)]
pub struct ImportBatch {
    pub id: i64,
    pub file_name: String,
    pub content_hash: String,
    pub status: ImportStatus,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub transaction_count: i64,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// A statement row waiting in the staging table.
#[derive(Debug, Clone, Serialize)]
pub struct StagedTransaction {
    pub id: i64,
    pub extract_id: i64,
    pub date: String,
    pub description: String,
    pub amount: Money,
    pub direction: Direction,
    pub document_number: Option<String>,
    pub review_status: ReviewStatus,
}

type BatchRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    i64,
    Option<String>,
    String,
);

type StagedRow = (i64, i64, String, String, i64, String, Option<String>, String);

const BATCH_COLUMNS: &str = "id, file_name, content_hash, status, period_start, period_end, transaction_count, error_message, created_at";

const STAGED_COLUMNS: &str =
    "id, extract_id, date, description, amount_cents, direction, document_number, review_status";

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    open(options).await
}

/// Private database that lives as long as the pool.
pub async fn create_memory_db() -> Result<DbPool, StorageError> {
    let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
    open(options).await
}

async fn open(options: SqliteConnectOptions) -> Result<DbPool, StorageError> {
    // One connection: SQLite serialises writers anyway, and an in-memory
    // database only exists on the connection that created it.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS statement_imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_name TEXT NOT NULL,
            content_hash TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'processing',
            period_start TEXT,
            period_end TEXT,
            transaction_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS statement_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            extract_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents >= 0),
            direction TEXT NOT NULL CHECK (direction IN ('credit', 'debit')),
            document_number TEXT,
            review_status TEXT NOT NULL DEFAULT 'pending',
            reviewed_at TEXT,
            FOREIGN KEY (extract_id) REFERENCES statement_imports(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_statement_transactions_extract ON statement_transactions(extract_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Import batches ────────────────────────────────────────────────────────────

/// Result of registering an upload by its content hash.
#[derive(Debug, Clone)]
pub enum BatchClaim {
    /// A new batch in `processing`, owned by the caller.
    Created(i64),
    /// A batch with the same hash already exists.
    Existing(ImportBatch),
}

/// Registers a statement upload, or returns the batch already holding `content_hash`.
///
/// The insert and the uniqueness check are one statement, so concurrent
/// uploads of the same bytes get exactly one `Created`.
pub async fn claim_import_batch(
    pool: &DbPool,
    file_name: &str,
    content_hash: &str,
) -> Result<BatchClaim, StorageError> {
    let created: Option<i64> = sqlx::query_scalar(
        "INSERT INTO statement_imports (file_name, content_hash) VALUES (?, ?) ON CONFLICT(content_hash) DO NOTHING RETURNING id",
    )
    .bind(file_name)
    .bind(content_hash)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = created {
        return Ok(BatchClaim::Created(id));
    }
    match find_batch_by_hash(pool, content_hash).await? {
        Some(existing) => Ok(BatchClaim::Existing(existing)),
        None => Err(StorageError::Db(sqlx::Error::RowNotFound)),
    }
}

/// Takes over an existing batch for another attempt.
///
/// Only a `failed` batch, or one left in `processing` for at least
/// `stale_after`, can be taken; `false` means someone else owns it or it
/// already completed.
pub async fn reclaim_import_batch(
    pool: &DbPool,
    batch_id: i64,
    file_name: &str,
    stale_after: Duration,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "UPDATE statement_imports SET status = 'processing', error_message = NULL, file_name = ?, updated_at = datetime('now') \
         WHERE id = ? AND (status = 'failed' OR (status = 'processing' AND updated_at <= datetime('now', ?)))",
    )
    .bind(file_name)
    .bind(batch_id)
    .bind(format!("-{} seconds", stale_after.as_secs()))
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Stages every extracted row and closes the batch, all or nothing.
///
/// Dates that do not exist on the calendar are rejected here; the extractor
/// passes them through untouched. Rows left by an earlier attempt are
/// replaced. The batch must still be `processing` when the transaction
/// commits, otherwise nothing is written.
pub async fn record_extraction(
    pool: &DbPool,
    batch_id: i64,
    extraction: &StatementExtraction,
) -> Result<(), StorageError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM statement_transactions WHERE extract_id = ?")
        .bind(batch_id)
        .execute(&mut *tx)
        .await?;

    for trx in &extraction.transactions {
        if trx.date.to_naive_date().is_none() {
            return Err(StorageError::InvalidDate(trx.date.to_string()));
        }
        let amount_cents = trx
            .amount
            .to_cents()
            .ok_or_else(|| StorageError::AmountOutOfRange(trx.amount.to_string()))?;

        sqlx::query(
            "INSERT INTO statement_transactions (extract_id, date, description, amount_cents, direction, document_number) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(batch_id)
        .bind(trx.date.as_str())
        .bind(&trx.description)
        .bind(amount_cents)
        .bind(trx.direction.to_string())
        .bind(&trx.document_number)
        .execute(&mut *tx)
        .await?;
    }

    let result = sqlx::query(
        "UPDATE statement_imports SET status = 'completed', period_start = ?, period_end = ?, transaction_count = ?, error_message = NULL, updated_at = datetime('now') WHERE id = ? AND status = 'processing'"
    )
    .bind(extraction.period_start().map(PostedDate::as_str))
    .bind(extraction.period_end().map(PostedDate::as_str))
    .bind(extraction.count as i64)
    .bind(batch_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        // Dropping `tx` rolls the inserts back.
        return Err(batch_state_error(&mut *tx, batch_id).await);
    }

    tx.commit().await?;
    tracing::info!(batch_id, count = extraction.count, "Statement rows staged");
    Ok(())
}

/// Only a batch still in `processing` can fail.
pub async fn mark_import_failed(pool: &DbPool, batch_id: i64, message: &str) -> Result<(), StorageError> {
    let result = sqlx::query(
        "UPDATE statement_imports SET status = 'failed', error_message = ?, updated_at = datetime('now') WHERE id = ? AND status = 'processing'",
    )
    .bind(message)
    .bind(batch_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(batch_state_error(pool, batch_id).await);
    }
    Ok(())
}

/// Tells a missing batch apart from one that left `processing`.
async fn batch_state_error<'c, E>(executor: E, batch_id: i64) -> StorageError
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let found: Result<Option<i64>, sqlx::Error> =
        sqlx::query_scalar("SELECT id FROM statement_imports WHERE id = ?")
            .bind(batch_id)
            .fetch_optional(executor)
            .await;
    match found {
        Ok(Some(_)) => StorageError::BatchNotProcessing(batch_id),
        Ok(None) => StorageError::BatchNotFound(batch_id),
        Err(e) => StorageError::Db(e),
    }
}

pub async fn get_import_batch(pool: &DbPool, batch_id: i64) -> Result<Option<ImportBatch>, StorageError> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {BATCH_COLUMNS} FROM statement_imports WHERE id = ?"
    ))
    .bind(batch_id)
    .fetch_optional(pool)
    .await?;
    row.map(batch_from_row).transpose()
}

pub async fn find_batch_by_hash(pool: &DbPool, content_hash: &str) -> Result<Option<ImportBatch>, StorageError> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {BATCH_COLUMNS} FROM statement_imports WHERE content_hash = ?"
    ))
    .bind(content_hash)
    .fetch_optional(pool)
    .await?;
    row.map(batch_from_row).transpose()
}

/// Newest first.
pub async fn get_import_batches(pool: &DbPool) -> Result<Vec<ImportBatch>, StorageError> {
    let rows = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {BATCH_COLUMNS} FROM statement_imports ORDER BY id DESC"
    ))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(batch_from_row).collect()
}

fn batch_from_row(r: BatchRow) -> Result<ImportBatch, StorageError> {
    let status = r.3.parse().map_err(StorageError::CorruptRow)?;
    Ok(ImportBatch {
        id: r.0,
        file_name: r.1,
        content_hash: r.2,
        status,
        period_start: r.4,
        period_end: r.5,
        transaction_count: r.6,
        error_message: r.7,
        created_at: r.8,
    })
}

// ── Staged statement rows ─────────────────────────────────────────────────────

/// Rows of a batch still awaiting review, in statement order.
pub async fn get_pending_statement_transactions(
    pool: &DbPool,
    batch_id: i64,
) -> Result<Vec<StagedTransaction>, StorageError> {
    let rows = sqlx::query_as::<_, StagedRow>(&format!(
        "SELECT {STAGED_COLUMNS} FROM statement_transactions WHERE extract_id = ? AND review_status = 'pending' ORDER BY id"
    ))
    .bind(batch_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(staged_from_row).collect()
}

pub async fn get_statement_transaction(
    pool: &DbPool,
    id: i64,
) -> Result<Option<StagedTransaction>, StorageError> {
    let row = sqlx::query_as::<_, StagedRow>(&format!(
        "SELECT {STAGED_COLUMNS} FROM statement_transactions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(staged_from_row).transpose()
}

/// Records the reviewer's decision on a pending row.
pub async fn review_statement_transaction(
    pool: &DbPool,
    id: i64,
    decision: ReviewStatus,
) -> Result<(), StorageError> {
    if decision == ReviewStatus::Pending {
        return Err(StorageError::InvalidReview(decision));
    }
    let result = sqlx::query(
        "UPDATE statement_transactions SET review_status = ?, reviewed_at = datetime('now') WHERE id = ? AND review_status = 'pending'",
    )
    .bind(decision.to_string())
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::NotReviewable(id));
    }
    Ok(())
}

fn staged_from_row(r: StagedRow) -> Result<StagedTransaction, StorageError> {
    let direction = r.5.parse().map_err(StorageError::CorruptRow)?;
    let review_status = r.7.parse().map_err(StorageError::CorruptRow)?;
    Ok(StagedTransaction {
        id: r.0,
        extract_id: r.1,
        date: r.2,
        description: r.3,
        amount: Money::from_cents(r.4),
        direction,
        document_number: r.6,
        review_status,
    })
}

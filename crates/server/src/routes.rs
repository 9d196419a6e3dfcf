use agency_core::{
    classify, CoarseStatus, Conciliation, DeadlineStatus, DeadlineWindow, Money, PayrollEntry,
    PayrollSummary, ReviewStatus, StatementTransaction, TaskClock,
};
use agency_import::content_hash;
use agency_storage::{BatchClaim, ImportBatch, StagedTransaction, StorageError};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::AppState;

const DEFAULT_FILE_NAME: &str = "statement.ofx";

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/imports", get(list_imports).post(create_import))
        .route("/api/imports/{id}", get(get_import))
        .route("/api/imports/{id}/transactions", get(list_pending_transactions))
        .route(
            "/api/statement-transactions/{id}/review",
            post(review_transaction),
        )
        .route("/api/deadline", post(deadline))
        .route("/api/payroll/summary", post(payroll_summary))
        .route("/api/conciliation", post(conciliation))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Statement imports ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ImportQuery {
    file_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImportResponse {
    #[serde(flatten)]
    batch: ImportBatch,
    duplicate: bool,
}

/// Stages the rows of one OFX upload.
///
/// A file whose hash matches an earlier import is not processed again,
/// unless that import failed or has sat in `processing` past the stale
/// limit; then it is retried in place.
async fn create_import(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<ImportResponse>), ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Statement body is empty".to_string()));
    }
    let file_name = query
        .file_name
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
    let hash = content_hash(&body);

    let batch_id = match agency_storage::claim_import_batch(&state.db, &file_name, &hash).await? {
        BatchClaim::Created(id) => id,
        BatchClaim::Existing(existing) => {
            let reclaimed = agency_storage::reclaim_import_batch(
                &state.db,
                existing.id,
                &file_name,
                state.stale_import_after,
            )
            .await?;
            if !reclaimed {
                tracing::info!(batch_id = existing.id, %file_name, "Statement already imported");
                return duplicate(&state, existing.id).await;
            }
            tracing::info!(batch_id = existing.id, %file_name, "Retrying statement import");
            existing.id
        }
    };

    let extraction = state.extractor.extract_bytes(&body);
    if extraction.is_empty() {
        tracing::warn!(batch_id, %file_name, "Statement has no transactions");
    }

    match agency_storage::record_extraction(&state.db, batch_id, &extraction).await {
        Ok(()) => {}
        Err(StorageError::BatchNotProcessing(_)) => {
            tracing::info!(batch_id, %file_name, "Statement import taken over by another upload");
            return duplicate(&state, batch_id).await;
        }
        Err(e) => {
            tracing::warn!(batch_id, error = %e, "Statement import failed");
            let message = e.to_string();
            match agency_storage::mark_import_failed(&state.db, batch_id, &message).await {
                Ok(()) | Err(StorageError::BatchNotProcessing(_)) => {}
                Err(other) => return Err(other.into()),
            }
            return Err(ApiError::ImportFailed { batch_id, message });
        }
    }

    let batch = load_batch(&state, batch_id).await?;
    tracing::info!(batch_id, count = batch.transaction_count, %file_name, "Statement imported");

    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            batch,
            duplicate: false,
        }),
    ))
}

async fn duplicate(
    state: &AppState,
    batch_id: i64,
) -> Result<(StatusCode, Json<ImportResponse>), ApiError> {
    let batch = load_batch(state, batch_id).await?;
    Ok((
        StatusCode::OK,
        Json(ImportResponse {
            batch,
            duplicate: true,
        }),
    ))
}

async fn load_batch(state: &AppState, batch_id: i64) -> Result<ImportBatch, ApiError> {
    agency_storage::get_import_batch(&state.db, batch_id)
        .await?
        .ok_or(ApiError::Storage(StorageError::BatchNotFound(batch_id)))
}

async fn list_imports(State(state): State<AppState>) -> Result<Json<Vec<ImportBatch>>, ApiError> {
    Ok(Json(agency_storage::get_import_batches(&state.db).await?))
}

async fn get_import(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ImportBatch>, ApiError> {
    agency_storage::get_import_batch(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Import batch not found: {id}")))
}

async fn list_pending_transactions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StagedTransaction>>, ApiError> {
    if agency_storage::get_import_batch(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Import batch not found: {id}")));
    }
    Ok(Json(
        agency_storage::get_pending_statement_transactions(&state.db, id).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    status: ReviewStatus,
}

async fn review_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<StagedTransaction>, ApiError> {
    agency_storage::review_statement_transaction(&state.db, id, req.status).await?;
    agency_storage::get_statement_transaction(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Statement transaction not found: {id}")))
}

// ── Calculators ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DeadlineRequest {
    created_at: DateTime<Utc>,
    due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    status: CoarseStatus,
    /// Defaults to the server clock.
    now: Option<DateTime<Utc>>,
}

async fn deadline(
    State(state): State<AppState>,
    Json(req): Json<DeadlineRequest>,
) -> Json<DeadlineStatus> {
    let task = TaskClock {
        window: DeadlineWindow::new(req.created_at, req.due_at),
        completed: req.completed,
        status: req.status,
    };
    let now = req.now.unwrap_or_else(Utc::now);
    Json(classify(&task, now, &state.deadline_policy))
}

async fn payroll_summary(Json(entries): Json<Vec<PayrollEntry>>) -> Json<PayrollSummary> {
    Json(PayrollSummary::from_entries(&entries))
}

#[derive(Debug, Deserialize)]
struct ConciliationRequest {
    transactions: Vec<StatementTransaction>,
    ledger_total: Money,
}

async fn conciliation(
    payload: Result<Json<ConciliationRequest>, JsonRejection>,
) -> Result<Json<Conciliation>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(Conciliation::for_statement(&req.transactions, req.ledger_total)))
}

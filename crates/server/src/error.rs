use agency_storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Import {batch_id} failed: {message}")]
    ImportFailed { batch_id: i64, message: String },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Storage(StorageError::BatchNotFound(_))
            | ApiError::Storage(StorageError::NotReviewable(_))
            | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::InvalidReview(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Storage(StorageError::BatchNotProcessing(_)) => StatusCode::CONFLICT,
            ApiError::ImportFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let mut body = json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        if let ApiError::ImportFailed { batch_id, .. } = &self {
            body["batch_id"] = json!(batch_id);
        }

        (status, Json(body)).into_response()
    }
}

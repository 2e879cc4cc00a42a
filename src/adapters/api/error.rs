//! API error type and its JSON rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use crate::usecases::journal::JournalError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Journal(e) if e.is_conflict() => StatusCode::CONFLICT,
            Self::Journal(JournalError::MalformedInput(_)) => StatusCode::BAD_REQUEST,
            Self::Journal(JournalError::StorageWrite { .. }) => StatusCode::BAD_GATEWAY,
            Self::Journal(JournalError::StorageRead { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Journal(JournalError::Export(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(e) => {
                error!("Internal error: {e:?}");
                "Internal server error".to_string()
            }
            other => {
                if status.is_server_error() {
                    warn!(status = status.as_u16(), error = %other, "Request failed");
                }
                other.to_string()
            }
        };

        (status, Json(ErrorBody { success: false, error: message })).into_response()
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use chatbuzz_db::StoreError;
use chatbuzz_gateway::router::RouterError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownUser(name) => Self::NotFound(format!("User not found: {name}")),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::InvalidParticipants => Self::BadRequest("Invalid users".into()),
            StoreError::DuplicateRequest => Self::BadRequest("Friend request already exists".into()),
            StoreError::NoPendingRequest => Self::BadRequest("No request to accept".into()),
            StoreError::InvalidMessage(msg) => Self::BadRequest(msg),
            e @ (StoreError::Corrupt(_) | StoreError::LockPoisoned | StoreError::Database(_)) => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::Store(e) => e.into(),
            RouterError::Join(e) => e.into(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("spawn_blocking join error: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => {
                debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, msg)
            }
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            Self::NotFound(msg) => {
                debug!(message = %msg, "Not found");
                (StatusCode::NOT_FOUND, msg)
            }
            Self::Conflict(msg) => {
                debug!(message = %msg, "Conflict");
                (StatusCode::CONFLICT, msg)
            }
            Self::Internal(detail) => {
                error!(error = %detail, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

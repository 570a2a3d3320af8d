use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use chatbuzz_types::models::{ChatMessage, MessagePayload};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::with_db;

/// Conversation between the caller and `with_user`, oldest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(with_user): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let history = with_db(&state, move |db| db.history(&claims.username, &with_user)).await?;
    Ok(Json(history))
}

/// REST counterpart of the gateway's `SendMessage`. Answers 202 whether or
/// not `to` exists; unknown receivers are dropped without notice.
pub async fn send_message(
    State(state): State<AppState>,
    Path(to): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<MessagePayload>,
) -> Result<StatusCode, ApiError> {
    state.router.deliver(&claims.username, &to, payload).await?;
    Ok(StatusCode::ACCEPTED)
}

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;

use chatbuzz_types::api::PublishStatusRequest;
use chatbuzz_types::models::Status;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::with_db;

pub async fn publish_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PublishStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.media_url.trim().is_empty() {
        return Err(ApiError::BadRequest("mediaUrl is required".into()));
    }

    let status = with_db(&state, move |db| {
        db.publish_status(&claims.username, &req.media_url, req.caption.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(status)))
}

/// Friends' statuses from the last 24 hours.
pub async fn friend_feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Status>>, ApiError> {
    let feed = with_db(&state, move |db| db.friend_feed(&claims.username, Utc::now())).await?;
    Ok(Json(feed))
}

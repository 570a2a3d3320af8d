use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;

use chatbuzz_types::api::{FriendActionRequest, FriendListResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::with_db;

pub async fn send_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| db.send_request(&claims.username, &req.username)).await?;
    Ok(Json(json!({ "status": "Request sent" })))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| db.accept_request(&claims.username, &req.username)).await?;
    Ok(Json(json!({ "status": "Request accepted" })))
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FriendListResponse>, ApiError> {
    let usernames = with_db(&state, move |db| db.list_friends(&claims.username)).await?;
    Ok(Json(FriendListResponse { usernames }))
}

pub async fn list_sent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FriendListResponse>, ApiError> {
    let usernames = with_db(&state, move |db| db.list_sent(&claims.username)).await?;
    Ok(Json(FriendListResponse { usernames }))
}

pub async fn list_received(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FriendListResponse>, ApiError> {
    let usernames = with_db(&state, move |db| db.list_received(&claims.username)).await?;
    Ok(Json(FriendListResponse { usernames }))
}

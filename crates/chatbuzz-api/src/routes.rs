use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};

use chatbuzz_gateway::connection;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{chat, friends, statuses};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/friends", get(friends::list_friends))
        .route("/friends/sent", get(friends::list_sent))
        .route("/friends/received", get(friends::list_received))
        .route("/friends/send", post(friends::send_request))
        .route("/friends/accept", post(friends::accept_request))
        .route("/chat/history/{with_user}", get(chat::get_history))
        .route("/chat/{to}", post(chat::send_message))
        .route("/status", post(statuses::publish_status))
        .route("/status/feed", get(statuses::friend_feed))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // The socket authenticates itself with an Identify command.
    let ws_route = Router::new().route("/gateway", get(ws_upgrade));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .with_state(state)
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let router = state.router.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, router, jwt_secret))
}

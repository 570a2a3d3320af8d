use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use chatbuzz_api::auth::AppStateInner;
use chatbuzz_db::Database;
use chatbuzz_gateway::dispatcher::{Dispatcher, topic_for};
use chatbuzz_types::events::GatewayEvent;

const SECRET: &str = "test-secret";

fn app(dispatcher: Dispatcher) -> Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    chatbuzz_api::router(AppStateInner::new(db, SECRET.into(), dispatcher))
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn signup(app: &Router, username: &str) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "correct horse battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn signup_friend_and_chat() {
    let dispatcher = Dispatcher::new();
    let app = app(dispatcher.clone());
    let alice = signup(&app, "alice").await;
    let bob = signup(&app, "bob").await;

    let (status, _) = call(&app, "POST", "/friends/send", Some(&bob), Some(json!({ "username": "alice" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, received) = call(&app, "GET", "/friends/received", Some(&alice), None).await;
    assert_eq!(received["usernames"], json!(["bob"]));

    let (status, _) = call(&app, "POST", "/friends/accept", Some(&alice), Some(json!({ "username": "bob" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "POST", "/friends/accept", Some(&alice), Some(json!({ "username": "bob" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No request to accept");

    let (_, friends) = call(&app, "GET", "/friends", Some(&bob), None).await;
    assert_eq!(friends["usernames"], json!(["alice"]));

    let mut bob_session = dispatcher.subscribe(&topic_for("bob")).await;
    let (status, _) = call(&app, "POST", "/chat/bob", Some(&alice), Some(json!({ "content": "hi" }))).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    match bob_session.recv().await.unwrap() {
        GatewayEvent::Message { payload, .. } => assert_eq!(payload.content.as_deref(), Some("hi")),
        other => panic!("unexpected push: {other:?}"),
    }

    let (status, history) = call(&app, "GET", "/chat/history/bob", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["content"], "hi");
    assert_eq!(history[0]["sender"], "alice");
    assert_eq!(history[0]["receiver"], "bob");
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let app = app(Dispatcher::new());
    signup(&app, "alice").await;

    let (status, body) = call(
        &app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({ "username": "alice", "email": "x@example.com", "password": "longenough" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "username already taken");
}

#[tokio::test]
async fn login_checks_password() {
    let app = app(Dispatcher::new());
    signup(&app, "alice").await;

    let (status, body) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let (status, _) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = app(Dispatcher::new());

    let (status, _) = call(&app, "GET", "/friends", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, "GET", "/friends", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn message_to_unknown_user_is_accepted_and_dropped() {
    let app = app(Dispatcher::new());
    let alice = signup(&app, "alice").await;

    let (status, _) = call(&app, "POST", "/chat/ghost", Some(&alice), Some(json!({ "content": "anyone?" }))).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, history) = call(&app, "GET", "/chat/history/ghost", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn status_feed_shows_friends_only() {
    let app = app(Dispatcher::new());
    let alice = signup(&app, "alice").await;
    let bob = signup(&app, "bob").await;
    let carol = signup(&app, "carol").await;

    call(&app, "POST", "/friends/send", Some(&alice), Some(json!({ "username": "bob" }))).await;
    call(&app, "POST", "/friends/accept", Some(&bob), Some(json!({ "username": "alice" }))).await;

    let (status, _) = call(
        &app,
        "POST",
        "/status",
        Some(&bob),
        Some(json!({ "mediaUrl": "https://cdn.example.com/b.jpg", "caption": "sunset" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    call(&app, "POST", "/status", Some(&carol), Some(json!({ "mediaUrl": "https://cdn.example.com/c.jpg" }))).await;

    let (status, feed) = call(&app, "GET", "/status/feed", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["owner"], "bob");
    assert_eq!(feed[0]["caption"], "sunset");
}

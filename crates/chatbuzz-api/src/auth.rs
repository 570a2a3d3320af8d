use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use chatbuzz_db::Database;
use chatbuzz_db::users::NewUser;
use chatbuzz_gateway::dispatcher::Dispatcher;
use chatbuzz_gateway::router::DeliveryRouter;
use chatbuzz_types::api::{Claims, LoginRequest, LoginResponse, SignUpRequest, SignUpResponse};

use crate::error::ApiError;
use crate::with_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub router: DeliveryRouter,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, jwt_secret: String, dispatcher: Dispatcher) -> AppState {
        let router = DeliveryRouter::new(db.clone(), dispatcher);
        Arc::new(Self {
            db,
            jwt_secret,
            router,
        })
    }
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::BadRequest("Username must be 3-32 characters".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("Password must be at least 8 characters".into()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?
        .to_string();

    let SignUpRequest { username, email, .. } = req;
    let user = with_db(&state, move |db| {
        db.create_user(NewUser {
            username: &username,
            email: &email,
            password_hash: &password_hash,
        })
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.username)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("Registered user {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = with_db(&state, move |db| db.find_credentials(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|e| ApiError::Internal(e.to_string()))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|_| ApiError::Internal(format!("corrupt user id '{}'", user.id)))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

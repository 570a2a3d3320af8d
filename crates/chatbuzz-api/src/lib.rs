pub mod auth;
pub mod chat;
pub mod error;
pub mod friends;
pub mod middleware;
pub mod routes;
pub mod statuses;

use chatbuzz_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;

pub use routes::router;

/// Run blocking store work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> chatbuzz_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    Ok(tokio::task::spawn_blocking(move || f(&db)).await??)
}

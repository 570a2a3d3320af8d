use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use chatbuzz_types::models::User;

use crate::models::{UserRow, to_micros};
use crate::{Database, Result, StoreError};

/// Fields needed to register a user. `password_hash` is already hashed.
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

impl Database {
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_username(conn, username))?
            .map(UserRow::into_user)
            .transpose()
    }

    /// Like [`Database::find_by_username`] but keeps the stored password hash.
    pub fn find_credentials(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn exists_by_username(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |row| row.get(0),
            )?)
        })
    }

    pub fn exists_by_email(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                [email],
                |row| row.get(0),
            )?)
        })
    }

    /// Create a user. The `exists_*` checks are only a fast path: the UNIQUE
    /// constraints on `users` are what actually reject a concurrent duplicate.
    pub fn create_user(&self, new: NewUser<'_>) -> Result<User> {
        if self.exists_by_username(new.username)? {
            return Err(StoreError::Conflict("username already taken".into()));
        }
        if self.exists_by_email(new.email)? {
            return Err(StoreError::Conflict("email already in use".into()));
        }

        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            username: new.username.to_string(),
            email: new.email.to_string(),
            password: new.password_hash.to_string(),
            created_at: to_micros(Utc::now()),
        };

        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (id, username, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (&row.id, &row.username, &row.email, &row.password, row.created_at),
            )
            .map_err(unique_violation)?;
            Ok(())
        })?;

        debug!("Created user {} ({})", row.username, row.id);
        row.into_user()
    }
}

/// Resolve a username to its stored id.
pub(crate) fn query_user_id(conn: &Connection, username: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT id FROM users WHERE username = ?1", [username], |row| {
            row.get(0)
        })
        .optional()?)
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, email, password, created_at FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn unique_violation(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &err
        && code.code == ErrorCode::ConstraintViolation
    {
        if msg.contains("users.username") {
            return StoreError::Conflict("username already taken".into());
        }
        if msg.contains("users.email") {
            return StoreError::Conflict("email already in use".into());
        }
    }
    err.into()
}

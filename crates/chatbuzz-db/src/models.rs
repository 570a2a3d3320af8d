//! Database row types and column conversions. Kept apart from the
//! `chatbuzz-types` models so the storage layout can change independently.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use chatbuzz_types::models::User;

use crate::{Result, StoreError};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: i64,
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            username: self.username,
            email: self.email,
            created_at: from_micros(self.created_at)?,
        })
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("bad id '{raw}': {e}")))
}

pub(crate) fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {micros}")))
}

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use chatbuzz_types::models::{ChatMessage, MessagePayload, User};

use crate::models::{from_micros, parse_id, to_micros};
use crate::{Database, Result, StoreError};

/// A message ready to be appended. The timestamp is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub sender: &'a User,
    pub receiver: &'a User,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
}

impl<'a> NewMessage<'a> {
    /// Build from a submitted payload. The media type is only kept when a
    /// media URL accompanies it.
    pub fn from_payload(sender: &'a User, receiver: &'a User, payload: &MessagePayload) -> Self {
        let media_url = payload.media_url.clone();
        let media_type = media_url.as_ref().and(payload.media_type.clone());

        Self {
            sender,
            receiver,
            content: payload.content.clone().unwrap_or_default(),
            media_url,
            media_type,
        }
    }
}

impl Database {
    /// Persist a message and return the stored record.
    ///
    /// Timestamps never decrease within a database: the new timestamp is the
    /// later of the wall clock and the newest stored message, taken under the
    /// write lock. Equal timestamps are ordered by insertion `seq`.
    pub fn append_message(&self, msg: &NewMessage<'_>) -> Result<ChatMessage> {
        if msg.content.is_empty() && msg.media_url.is_none() {
            return Err(StoreError::InvalidMessage(
                "content may only be empty when media is attached".into(),
            ));
        }

        let id = Uuid::new_v4();
        let timestamp = self.with_tx(|tx| {
            let latest: Option<i64> =
                tx.query_row("SELECT MAX(created_at) FROM messages", [], |row| row.get(0))?;
            let now = to_micros(Utc::now());
            let created_at = latest.map_or(now, |latest| now.max(latest));

            tx.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, content, media_url, media_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    msg.sender.id.to_string(),
                    msg.receiver.id.to_string(),
                    msg.content,
                    msg.media_url,
                    msg.media_type,
                    created_at,
                ],
            )?;
            Ok(created_at)
        })?;

        Ok(ChatMessage {
            id,
            sender: msg.sender.username.clone(),
            receiver: msg.receiver.username.clone(),
            content: msg.content.clone(),
            timestamp: from_micros(timestamp)?,
            media_url: msg.media_url.clone(),
            media_type: msg.media_type.clone(),
        })
    }

    /// All messages exchanged between `a` and `b` in either direction, oldest
    /// first. Unknown users simply match nothing.
    pub fn history(&self, a: &str, b: &str) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| query_history(conn, a, b))
    }
}

fn query_history(conn: &Connection, a: &str, b: &str) -> Result<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, s.username, r.username, m.content, m.media_url, m.media_type, m.created_at
         FROM messages m
         JOIN users s ON s.id = m.sender_id
         JOIN users r ON r.id = m.receiver_id
         WHERE (s.username = ?1 AND r.username = ?2)
            OR (s.username = ?2 AND r.username = ?1)
         ORDER BY m.created_at ASC, m.seq ASC",
    )?;

    let rows = stmt
        .query_map([a, b], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, sender, receiver, content, media_url, media_type, created_at)| {
            Ok(ChatMessage {
                id: parse_id(&id)?,
                sender,
                receiver,
                content,
                timestamp: from_micros(created_at)?,
                media_url,
                media_type,
            })
        })
        .collect()
}

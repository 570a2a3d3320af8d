use chrono::{DateTime, Duration, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Statement};
use uuid::Uuid;

use chatbuzz_types::models::Status;

use crate::models::{from_micros, parse_id, to_micros};
use crate::users::query_user_id;
use crate::{Database, Result, StoreError};

/// How long a status stays visible to friends after upload.
pub const STATUS_VISIBILITY_HOURS: i64 = 24;

/// Owners bound per `IN (...)` query. SQLite caps a statement at 32766
/// parameters.
const OWNERS_PER_QUERY: usize = 1000;

const FRIEND_FEED_SQL: &str = "
    SELECT s.id, u.username, s.media_url, s.caption, s.uploaded_at
    FROM relationships r
    JOIN statuses s
      ON s.owner_id = CASE WHEN r.user_lo = ?1 THEN r.user_hi ELSE r.user_lo END
    JOIN users u ON u.id = s.owner_id
    WHERE r.state = 'friends'
      AND (r.user_lo = ?1 OR r.user_hi = ?1)
      AND s.uploaded_at > ?2";

impl Database {
    pub fn publish_status(&self, owner: &str, media_url: &str, caption: Option<&str>) -> Result<Status> {
        self.publish_status_at(owner, media_url, caption, Utc::now())
    }

    pub fn publish_status_at(
        &self,
        owner: &str,
        media_url: &str,
        caption: Option<&str>,
        uploaded_at: DateTime<Utc>,
    ) -> Result<Status> {
        let id = Uuid::new_v4();
        let uploaded_at = to_micros(uploaded_at);

        self.with_tx(|tx| {
            let owner_id =
                query_user_id(tx, owner)?.ok_or_else(|| StoreError::UnknownUser(owner.to_string()))?;

            tx.execute(
                "INSERT INTO statuses (id, owner_id, media_url, caption, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id.to_string(), owner_id, media_url, caption, uploaded_at],
            )?;
            Ok(())
        })?;

        Ok(Status {
            id,
            owner: owner.to_string(),
            media_url: media_url.to_string(),
            caption: caption.map(str::to_string),
            uploaded_at: from_micros(uploaded_at)?,
        })
    }

    /// Statuses owned by any of `owners` uploaded strictly after `since`.
    /// Result order is unspecified.
    pub fn recent_by_owners(&self, owners: &[String], since: DateTime<Utc>) -> Result<Vec<Status>> {
        let since = to_micros(since);

        self.with_conn(|conn| {
            let mut statuses = Vec::new();
            for chunk in owners.chunks(OWNERS_PER_QUERY) {
                statuses.extend(query_chunk(conn, chunk, since)?);
            }
            Ok(statuses)
        })
    }

    /// Statuses from `viewer`'s friends that are still inside the
    /// visibility window at `now`.
    ///
    /// Same result as `recent_by_owners(&list_friends(viewer), now - 24h)`,
    /// but joined in SQL so the friend list is never bound as parameters.
    pub fn friend_feed(&self, viewer: &str, now: DateTime<Utc>) -> Result<Vec<Status>> {
        let since = to_micros(now - Duration::hours(STATUS_VISIBILITY_HOURS));

        self.with_conn(|conn| {
            let viewer_id =
                query_user_id(conn, viewer)?.ok_or_else(|| StoreError::UnknownUser(viewer.to_string()))?;

            let mut stmt = conn.prepare(FRIEND_FEED_SQL)?;
            read_statuses(&mut stmt, rusqlite::params![viewer_id, since])
        })
    }
}

fn query_chunk(conn: &Connection, owners: &[String], since: i64) -> Result<Vec<Status>> {
    let placeholders: Vec<String> = (2..=owners.len() + 1).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT s.id, u.username, s.media_url, s.caption, s.uploaded_at
         FROM statuses s
         JOIN users u ON u.id = s.owner_id
         WHERE s.uploaded_at > ?1 AND u.username IN ({})",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(owners.len() + 1);
    params.push(&since);
    params.extend(owners.iter().map(|o| o as &dyn ToSql));

    read_statuses(&mut stmt, &params)
}

fn read_statuses(stmt: &mut Statement<'_>, params: &[&dyn ToSql]) -> Result<Vec<Status>> {
    let rows = stmt
        .query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, owner, media_url, caption, uploaded_at)| {
            Ok(Status {
                id: parse_id(&id)?,
                owner,
                media_url,
                caption,
                uploaded_at: from_micros(uploaded_at)?,
            })
        })
        .collect()
}

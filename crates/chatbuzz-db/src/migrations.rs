use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub(crate) fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            -- One row per unordered pair; user_lo < user_hi keeps the pair canonical.
            CREATE TABLE relationships (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_lo     TEXT NOT NULL REFERENCES users(id),
                user_hi     TEXT NOT NULL REFERENCES users(id),
                state       TEXT NOT NULL CHECK (state IN ('pending', 'friends')),
                requester   TEXT REFERENCES users(id),
                since       INTEGER NOT NULL,
                UNIQUE (user_lo, user_hi),
                CHECK (user_lo < user_hi),
                CHECK ((state = 'pending') = (requester IS NOT NULL))
            );

            CREATE TABLE messages (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT NOT NULL UNIQUE,
                sender_id   TEXT NOT NULL REFERENCES users(id),
                receiver_id TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                media_url   TEXT,
                media_type  TEXT,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_messages_pair
                ON messages(sender_id, receiver_id, created_at);

            CREATE INDEX idx_messages_created
                ON messages(created_at);

            CREATE TABLE statuses (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT NOT NULL UNIQUE,
                owner_id    TEXT NOT NULL REFERENCES users(id),
                media_url   TEXT NOT NULL,
                caption     TEXT,
                uploaded_at INTEGER NOT NULL
            );

            CREATE INDEX idx_statuses_owner
                ON statuses(owner_id, uploaded_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

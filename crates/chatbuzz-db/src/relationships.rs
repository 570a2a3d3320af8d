//! Friend graph. Every pair of users owns at most one row in `relationships`,
//! keyed by the unordered pair, so a pending request and a friendship can
//! never coexist and neither side keeps its own copy of the edge.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::models::to_micros;
use crate::users::query_user_id;
use crate::{Database, Result, StoreError};

/// Relationship between two users as seen from the pair itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairState {
    None,
    Pending { requester: String },
    Friends,
}

const SENT_SQL: &str = "
    SELECT u.username FROM relationships r
    JOIN users u ON u.id = CASE WHEN r.user_lo = ?1 THEN r.user_hi ELSE r.user_lo END
    WHERE r.state = 'pending' AND r.requester = ?1
    ORDER BY r.seq";

const RECEIVED_SQL: &str = "
    SELECT u.username FROM relationships r
    JOIN users u ON u.id = r.requester
    WHERE r.state = 'pending' AND (r.user_lo = ?1 OR r.user_hi = ?1) AND r.requester != ?1
    ORDER BY r.seq";

const FRIENDS_SQL: &str = "
    SELECT u.username FROM relationships r
    JOIN users u ON u.id = CASE WHEN r.user_lo = ?1 THEN r.user_hi ELSE r.user_lo END
    WHERE r.state = 'friends' AND (r.user_lo = ?1 OR r.user_hi = ?1)
    ORDER BY r.seq";

impl Database {
    /// Record a pending request from `sender` to `receiver`.
    pub fn send_request(&self, sender: &str, receiver: &str) -> Result<()> {
        self.with_tx(|tx| {
            let (sender_id, receiver_id) = resolve_pair(tx, sender, receiver)?;
            let (lo, hi) = canonical(&sender_id, &receiver_id);

            if query_pair(tx, lo, hi)?.is_some() {
                return Err(StoreError::DuplicateRequest);
            }

            tx.execute(
                "INSERT INTO relationships (user_lo, user_hi, state, requester, since) VALUES (?1, ?2, 'pending', ?3, ?4)",
                (lo, hi, &sender_id, to_micros(Utc::now())),
            )?;
            Ok(())
        })?;

        debug!("Friend request {} -> {}", sender, receiver);
        Ok(())
    }

    /// Accept the request `sender` made to `receiver`, turning the pending
    /// edge into a friendship.
    pub fn accept_request(&self, receiver: &str, sender: &str) -> Result<()> {
        self.with_tx(|tx| {
            let (receiver_id, sender_id) = resolve_pair(tx, receiver, sender)?;
            let (lo, hi) = canonical(&receiver_id, &sender_id);

            match query_pair(tx, lo, hi)? {
                Some((seq, PairState::Pending { requester })) if requester == sender_id => {
                    // Re-insert so friend lists are ordered by acceptance.
                    tx.execute("DELETE FROM relationships WHERE seq = ?1", [seq])?;
                    tx.execute(
                        "INSERT INTO relationships (user_lo, user_hi, state, requester, since) VALUES (?1, ?2, 'friends', NULL, ?3)",
                        (lo, hi, to_micros(Utc::now())),
                    )?;
                    Ok(())
                }
                _ => Err(StoreError::NoPendingRequest),
            }
        })?;

        debug!("Friend request {} -> {} accepted", sender, receiver);
        Ok(())
    }

    /// Current state of the pair. The requester, if any, is a username.
    pub fn pair_state(&self, a: &str, b: &str) -> Result<PairState> {
        self.with_conn(|conn| {
            let (a_id, b_id) = resolve_pair(conn, a, b)?;
            let (lo, hi) = canonical(&a_id, &b_id);

            Ok(match query_pair(conn, lo, hi)? {
                None => PairState::None,
                Some((_, PairState::Pending { requester })) => {
                    let name = if requester == a_id { a } else { b };
                    PairState::Pending {
                        requester: name.to_string(),
                    }
                }
                Some((_, state)) => state,
            })
        })
    }

    /// Users `user` has a pending request to.
    pub fn list_sent(&self, user: &str) -> Result<Vec<String>> {
        self.list_counterparts(user, SENT_SQL)
    }

    /// Users with a pending request to `user`.
    pub fn list_received(&self, user: &str) -> Result<Vec<String>> {
        self.list_counterparts(user, RECEIVED_SQL)
    }

    pub fn list_friends(&self, user: &str) -> Result<Vec<String>> {
        self.list_counterparts(user, FRIENDS_SQL)
    }

    fn list_counterparts(&self, user: &str, sql: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let user_id =
                query_user_id(conn, user)?.ok_or_else(|| StoreError::UnknownUser(user.to_string()))?;

            let mut stmt = conn.prepare(sql)?;
            let names = stmt
                .query_map([&user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }
}

fn resolve_pair(conn: &Connection, a: &str, b: &str) -> Result<(String, String)> {
    if a == b {
        return Err(StoreError::InvalidParticipants);
    }
    let a_id = query_user_id(conn, a)?.ok_or(StoreError::InvalidParticipants)?;
    let b_id = query_user_id(conn, b)?.ok_or(StoreError::InvalidParticipants)?;
    Ok((a_id, b_id))
}

fn canonical<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a < b { (a, b) } else { (b, a) }
}

/// Returns the row's seq and state. Pending requesters are user ids here.
fn query_pair(conn: &Connection, lo: &str, hi: &str) -> Result<Option<(i64, PairState)>> {
    let row = conn
        .query_row(
            "SELECT seq, state, requester FROM relationships WHERE user_lo = ?1 AND user_hi = ?2",
            [lo, hi],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()?;

    row.map(|(seq, state, requester)| match (state.as_str(), requester) {
        ("friends", _) => Ok((seq, PairState::Friends)),
        ("pending", Some(requester)) => Ok((seq, PairState::Pending { requester })),
        (other, _) => Err(StoreError::Corrupt(format!("relationship {seq} in state '{other}'"))),
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;
    use crate::users::tests::signup;

    fn db_with(users: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for u in users {
            signup(&db, u);
        }
        db
    }

    #[test]
    fn request_then_duplicate_rejected() {
        let db = db_with(&["alice", "bob"]);

        db.send_request("alice", "bob").unwrap();
        assert!(matches!(
            db.send_request("alice", "bob"),
            Err(StoreError::DuplicateRequest)
        ));
        assert_eq!(db.list_sent("alice").unwrap(), vec!["bob"]);
        assert_eq!(db.list_received("bob").unwrap(), vec!["alice"]);
        assert!(db.list_sent("bob").unwrap().is_empty());
        assert!(db.list_received("alice").unwrap().is_empty());
    }

    #[test]
    fn reverse_request_does_not_create_second_edge() {
        let db = db_with(&["alice", "bob"]);

        db.send_request("alice", "bob").unwrap();
        assert!(matches!(
            db.send_request("bob", "alice"),
            Err(StoreError::DuplicateRequest)
        ));

        assert_eq!(
            db.pair_state("bob", "alice").unwrap(),
            PairState::Pending {
                requester: "alice".into()
            }
        );
        assert!(db.list_sent("bob").unwrap().is_empty());
        assert!(db.list_received("alice").unwrap().is_empty());
    }

    #[test]
    fn self_and_unknown_requests_rejected() {
        let db = db_with(&["alice"]);

        assert!(matches!(
            db.send_request("alice", "alice"),
            Err(StoreError::InvalidParticipants)
        ));
        assert!(matches!(
            db.send_request("alice", "ghost"),
            Err(StoreError::InvalidParticipants)
        ));
        assert!(matches!(
            db.accept_request("ghost", "alice"),
            Err(StoreError::InvalidParticipants)
        ));
    }

    #[test]
    fn accept_makes_symmetric_friends() {
        let db = db_with(&["alice", "bob"]);

        db.send_request("alice", "bob").unwrap();
        db.accept_request("bob", "alice").unwrap();

        assert_eq!(db.list_friends("alice").unwrap(), vec!["bob"]);
        assert_eq!(db.list_friends("bob").unwrap(), vec!["alice"]);
        assert!(db.list_sent("alice").unwrap().is_empty());
        assert!(db.list_received("bob").unwrap().is_empty());
        assert_eq!(db.pair_state("alice", "bob").unwrap(), PairState::Friends);

        assert!(matches!(
            db.accept_request("bob", "alice"),
            Err(StoreError::NoPendingRequest)
        ));
    }

    #[test]
    fn requester_cannot_accept_own_request() {
        let db = db_with(&["alice", "bob"]);

        db.send_request("alice", "bob").unwrap();
        assert!(matches!(
            db.accept_request("alice", "bob"),
            Err(StoreError::NoPendingRequest)
        ));
        assert!(db.list_friends("alice").unwrap().is_empty());
    }

    #[test]
    fn request_to_friend_rejected() {
        let db = db_with(&["alice", "bob"]);

        db.send_request("alice", "bob").unwrap();
        db.accept_request("bob", "alice").unwrap();

        assert!(matches!(
            db.send_request("alice", "bob"),
            Err(StoreError::DuplicateRequest)
        ));
        assert!(matches!(
            db.send_request("bob", "alice"),
            Err(StoreError::DuplicateRequest)
        ));
        assert_eq!(db.list_friends("bob").unwrap(), vec!["alice"]);
    }

    #[test]
    fn friends_listed_in_acceptance_order() {
        let db = db_with(&["alice", "bob", "carol", "dave"]);

        db.send_request("bob", "alice").unwrap();
        db.send_request("carol", "alice").unwrap();
        db.send_request("dave", "alice").unwrap();
        assert_eq!(db.list_received("alice").unwrap(), vec!["bob", "carol", "dave"]);

        db.accept_request("alice", "dave").unwrap();
        db.accept_request("alice", "bob").unwrap();

        assert_eq!(db.list_friends("alice").unwrap(), vec!["dave", "bob"]);
        assert_eq!(db.list_received("alice").unwrap(), vec!["carol"]);
    }

    #[test]
    fn unknown_user_listing_fails() {
        let db = db_with(&[]);
        assert!(matches!(
            db.list_friends("ghost"),
            Err(StoreError::UnknownUser(_))
        ));
    }

    #[test]
    fn concurrent_opposite_requests_yield_one_edge() {
        for _ in 0..20 {
            let db = Arc::new(db_with(&["alice", "bob"]));
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = [("alice", "bob"), ("bob", "alice")]
                .into_iter()
                .map(|(from, to)| {
                    let db = db.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        db.send_request(from, to)
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let ok = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(ok, 1, "exactly one direction must win: {results:?}");

            let sent = db.list_sent("alice").unwrap().len() + db.list_sent("bob").unwrap().len();
            assert_eq!(sent, 1);
        }
    }
}

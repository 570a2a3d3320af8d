use thiserror::Error;

/// Failures surfaced by the stores. Every variant is local and recoverable.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid participants")]
    InvalidParticipants,

    #[error("friend request already exists")]
    DuplicateRequest,

    #[error("no pending friend request")]
    NoPendingRequest,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

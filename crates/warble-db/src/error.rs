use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A UNIQUE constraint rejected the write. Carries the user-facing name
    /// of the offending column ("username", "email", ...).
    #[error("{0} already taken")]
    Duplicate(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Map a UNIQUE-constraint failure onto `Duplicate`, naming the column from
/// SQLite's "UNIQUE constraint failed: <table>.<column>" message. Uniqueness
/// is detected here, at commit time, rather than by a pre-check, so the
/// constraint itself arbitrates racing inserts.
pub(crate) fn map_unique(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref err, Some(ref msg)) = e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return StoreError::Duplicate("username");
            }
            if msg.contains("users.email") {
                return StoreError::Duplicate("email");
            }
            if msg.contains("likes.message_id") {
                return StoreError::Duplicate("like");
            }
        }
    }
    StoreError::Sqlite(e)
}

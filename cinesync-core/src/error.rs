use thiserror::Error;

/// Service-level error kinds (§7). `Transient` is intentionally absent —
/// it never escapes `retry::with_retry`, which either recovers it locally
/// or promotes it to `Error::Db` once retries are exhausted.
#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("subprocess error: {0}")]
    Subprocess(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// §7 kind 8: a missing-table error from the co-owned MAIN database is
    /// downgraded to "the organizer hasn't created its schema yet" rather
    /// than surfaced as a hard failure.
    pub fn is_missing_table(&self) -> bool {
        matches!(self, Error::Db(sqlx::Error::Database(db_err)) if db_err
            .message()
            .to_lowercase()
            .contains("no such table"))
    }
}

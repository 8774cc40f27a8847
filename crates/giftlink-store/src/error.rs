use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] postgres::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A row referenced a user that has never been registered.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// A previous holder of the connection panicked.
    #[error("Connection lock poisoned")]
    LockPoisoned,

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

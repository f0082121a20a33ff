use thiserror::Error;

/// Storage-layer errors. Always surfaced to the caller; the scheduler turns
/// them into "skip this tick" rather than "nobody is subscribed".
#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A thread panicked while holding the connection lock.
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, PrefsError>;

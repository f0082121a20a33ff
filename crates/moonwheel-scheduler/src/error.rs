use thiserror::Error;

use moonwheel_notify::NotifyError;
use moonwheel_prefs::PrefsError;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Reading subscribers or writing markers failed.
    #[error("Store error: {0}")]
    Store(#[from] PrefsError),

    #[error("Compose error: {0}")]
    Compose(#[from] NotifyError),

    /// A stored region key is missing from the catalog.
    #[error("Unknown region: {key}")]
    UnknownRegion { key: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

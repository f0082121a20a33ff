use thiserror::Error;

use moonwheel_prefs::PrefsError;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The content pools could not be read.
    #[error("Content error: {0}")]
    Content(#[from] PrefsError),

    #[error("Unknown region: {key}")]
    UnknownRegion { key: String },
}

pub type Result<T> = std::result::Result<T, NotifyError>;

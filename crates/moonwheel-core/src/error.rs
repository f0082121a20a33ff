use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoonwheelError {
    /// Missing credentials, malformed region table, out-of-range settings.
    /// Always fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown region: {key}")]
    UnknownRegion { key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MoonwheelError {
    /// Short error code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            MoonwheelError::Config(_) => "CONFIG_ERROR",
            MoonwheelError::UnknownRegion { .. } => "UNKNOWN_REGION",
            MoonwheelError::Io(_) => "IO_ERROR",
            MoonwheelError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, MoonwheelError>;

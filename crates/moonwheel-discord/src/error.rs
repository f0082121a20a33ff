use moonwheel_notify::NotifyError;
use moonwheel_prefs::PrefsError;

/// Errors produced by the Discord adapter.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("no bot token configured")]
    NoToken,

    #[error("storage error: {0}")]
    Prefs(#[from] PrefsError),

    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),
}

pub type Result<T> = std::result::Result<T, DiscordError>;

use thiserror::Error;

use crate::session::Step;

#[derive(Debug, Error)]
pub enum OnboardingError {
    /// The choice belongs to a different step than the session is on,
    /// e.g. a stale button from an earlier message.
    #[error("choice does not apply to step {step}")]
    WrongStep { step: Step },

    #[error("'{value}' is not one of the offered options")]
    UnknownOption { value: String },

    #[error("onboarding session is already finished ({step})")]
    Finished { step: Step },
}

pub type Result<T> = std::result::Result<T, OnboardingError>;

//! `moonwheel-onboarding`: the three-step setup wizard.
//!
//! [`session`] is the pure state machine (no I/O, no clock). [`manager`]
//! keeps one in-flight session per user in memory and writes the result to
//! the preference store exactly once, when the last step is answered.

pub mod error;
pub mod manager;
pub mod session;

pub use error::{OnboardingError, Result};
pub use manager::{OnboardingManager, OnboardingOutcome};
pub use session::{
    Choice, OnboardingPrompt, OnboardingSession, PromptOption, Step, Transition,
};

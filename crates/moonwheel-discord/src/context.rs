//! What the Discord layer needs from the running application.
//!
//! The binary's `AppState` implements this; the handler and command code
//! stay generic so tests and the binary can supply different wiring.

use chrono::{DateTime, Utc};

use moonwheel_core::RegionCatalog;
use moonwheel_notify::{Composer, DispatchGateway};
use moonwheel_onboarding::OnboardingManager;
use moonwheel_prefs::{ContentPool, PreferenceStore};

pub trait DiscordAppContext: Send + Sync {
    fn store(&self) -> &PreferenceStore;
    fn content(&self) -> &ContentPool;
    fn composer(&self) -> &Composer;
    fn onboarding(&self) -> &OnboardingManager;
    fn gateway(&self) -> &DispatchGateway;
    fn catalog(&self) -> &RegionCatalog;
    /// When the process started; shown by `/status`.
    fn started_at(&self) -> DateTime<Utc>;
}

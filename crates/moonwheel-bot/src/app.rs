use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info};

use moonwheel_core::{MoonwheelConfig, RegionCatalog};
use moonwheel_discord::DiscordAppContext;
use moonwheel_notify::{Composer, DispatchGateway};
use moonwheel_onboarding::OnboardingManager;
use moonwheel_prefs::{ContentPool, PreferenceStore};

/// How often abandoned onboarding sessions are swept.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Central shared state, passed as `Arc<AppState>` to the Discord handler.
pub struct AppState {
    pub config: MoonwheelConfig,
    pub catalog: Arc<RegionCatalog>,
    pub store: PreferenceStore,
    pub content: ContentPool,
    pub composer: Composer,
    pub gateway: DispatchGateway,
    pub onboarding: OnboardingManager,
    pub started_at: DateTime<Utc>,
}

impl DiscordAppContext for AppState {
    fn store(&self) -> &PreferenceStore {
        &self.store
    }

    fn content(&self) -> &ContentPool {
        &self.content
    }

    fn composer(&self) -> &Composer {
        &self.composer
    }

    fn onboarding(&self) -> &OnboardingManager {
        &self.onboarding
    }

    fn gateway(&self) -> &DispatchGateway {
        &self.gateway
    }

    fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Drop onboarding sessions that sat idle past the timeout, until shutdown.
pub async fn purge_onboarding(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let purged = state.onboarding.purge_expired(Utc::now());
                if purged > 0 {
                    info!(purged, "expired onboarding sessions dropped");
                } else {
                    debug!(active = state.onboarding.active_sessions(), "onboarding sweep");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

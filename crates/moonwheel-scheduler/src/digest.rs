use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use moonwheel_prefs::UserPreference;

use crate::engine::SchedulerEngine;
use crate::error::Result;
use crate::schedule::{digest_due, DAILY_DIGEST_KIND};
use crate::types::{TickReport, UserOutcome};

impl SchedulerEngine {
    /// One daily-digest tick at `now`.
    pub async fn digest_tick_at(&self, now: DateTime<Utc>) -> Result<TickReport> {
        self.for_each_subscriber(|pref| self.digest_for(pref, now))
            .await
    }

    async fn digest_for(&self, pref: UserPreference, now: DateTime<Utc>) -> UserOutcome {
        let Some(region) = self.region_for(&pref) else {
            return UserOutcome::Skipped;
        };
        let Some(local_date) = digest_due(&pref, region, now) else {
            return UserOutcome::Skipped;
        };

        let claim = match self
            .markers
            .claim(pref.user_id, DAILY_DIGEST_KIND, &local_date.to_string())
        {
            Ok(Some(claim)) => claim,
            Ok(None) => return UserOutcome::Skipped,
            Err(e) => {
                warn!(user_id = pref.user_id, error = %e, "digest marker claim failed");
                return UserOutcome::Failed;
            }
        };

        let payload = match self.composer.compose(&pref, region, now) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(user_id = pref.user_id, error = %e, "digest compose failed");
                self.release(&claim);
                return UserOutcome::Failed;
            }
        };

        debug!(user_id = pref.user_id, %local_date, "sending daily digest");
        self.deliver_claimed(claim, payload).await
    }
}

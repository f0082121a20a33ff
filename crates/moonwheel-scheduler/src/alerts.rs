use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use moonwheel_prefs::UserPreference;

use crate::engine::SchedulerEngine;
use crate::error::Result;
use crate::schedule::{alert_due, alert_kind};
use crate::types::{TickReport, UserOutcome};

impl SchedulerEngine {
    /// One event-alert tick at `now`.
    pub async fn alert_tick_at(&self, now: DateTime<Utc>) -> Result<TickReport> {
        self.for_each_subscriber(|pref| self.alert_for(pref, now))
            .await
    }

    async fn alert_for(&self, pref: UserPreference, now: DateTime<Utc>) -> UserOutcome {
        let Some(region) = self.region_for(&pref) else {
            return UserOutcome::Skipped;
        };
        let Some((event, lead)) = alert_due(&pref, region, now, &self.config.alert_lead_days)
        else {
            return UserOutcome::Skipped;
        };

        let kind = alert_kind(event.name, lead);
        let claim = match self
            .markers
            .claim(pref.user_id, &kind, &event.date.to_string())
        {
            Ok(Some(claim)) => claim,
            Ok(None) => return UserOutcome::Skipped,
            Err(e) => {
                warn!(user_id = pref.user_id, %kind, error = %e, "alert marker claim failed");
                return UserOutcome::Failed;
            }
        };

        debug!(user_id = pref.user_id, event = event.name, lead, "sending event alert");
        let payload = self.composer.compose_event_alert(region, &event, lead);
        self.deliver_claimed(claim, payload).await
    }
}

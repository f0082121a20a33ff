use serde::{Deserialize, Serialize};

use moonwheel_core::config::DEFAULT_DELIVERY_HOUR;
use moonwheel_core::DeliveryDays;

use crate::error::{PrefsError, Result};

/// One row of the `users` table.
///
/// `region` stays `None` until onboarding completes; such a record is never
/// handed to the calendar. `subscribed` gates every outbound notification,
/// `daily_digest` gates only the recurring daily message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    /// Chat-platform user id.
    pub user_id: u64,
    /// Name to greet the user by, refreshed whenever they change settings.
    pub display_name: Option<String>,
    pub region: Option<String>,
    /// Free-form interest tag, carried through for personalisation only.
    pub tag: Option<String>,
    /// 0–23, local to the region's timezone.
    pub delivery_hour: u8,
    pub delivery_days: DeliveryDays,
    pub subscribed: bool,
    pub daily_digest: bool,

    // Audit timestamps (RFC 3339)
    pub created_at: String,
    pub updated_at: String,
}

impl UserPreference {
    /// The record an absent user is treated as before an upsert overlays it.
    pub fn with_defaults(user_id: u64, now: &str) -> Self {
        Self {
            user_id,
            display_name: None,
            region: None,
            tag: None,
            delivery_hour: DEFAULT_DELIVERY_HOUR,
            delivery_days: DeliveryDays::all(),
            subscribed: false,
            daily_digest: false,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Same user-visible settings, ignoring audit timestamps.
    pub fn same_settings(&self, other: &UserPreference) -> bool {
        self.region == other.region
            && self.display_name == other.display_name
            && self.tag == other.tag
            && self.delivery_hour == other.delivery_hour
            && self.delivery_days == other.delivery_days
            && self.subscribed == other.subscribed
            && self.daily_digest == other.daily_digest
    }
}

/// Partial update. `None` preserves whatever is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceUpdate {
    pub display_name: Option<String>,
    pub region: Option<String>,
    pub tag: Option<String>,
    pub delivery_hour: Option<u8>,
    pub delivery_days: Option<DeliveryDays>,
    pub subscribed: Option<bool>,
    pub daily_digest: Option<bool>,
}

impl PreferenceUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn delivery_hour(mut self, hour: u8) -> Self {
        self.delivery_hour = Some(hour);
        self
    }

    pub fn delivery_days(mut self, days: DeliveryDays) -> Self {
        self.delivery_days = Some(days);
        self
    }

    pub fn subscribed(mut self, subscribed: bool) -> Self {
        self.subscribed = Some(subscribed);
        self
    }

    pub fn daily_digest(mut self, daily_digest: bool) -> Self {
        self.daily_digest = Some(daily_digest);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(hour) = self.delivery_hour {
            if hour > 23 {
                return Err(PrefsError::InvalidField {
                    field: "delivery_hour",
                    reason: format!("{} is not an hour of the day", hour),
                });
            }
        }
        if let Some(region) = &self.region {
            if region.trim().is_empty() {
                return Err(PrefsError::InvalidField {
                    field: "region",
                    reason: "must not be blank".into(),
                });
            }
        }
        if let Some(name) = &self.display_name {
            if name.trim().is_empty() {
                return Err(PrefsError::InvalidField {
                    field: "display_name",
                    reason: "must not be blank".into(),
                });
            }
        }
        Ok(())
    }

    /// Overlay the supplied fields onto `pref`.
    pub fn apply_to(&self, pref: &mut UserPreference) {
        if let Some(name) = &self.display_name {
            pref.display_name = Some(name.trim().to_string());
        }
        if let Some(region) = &self.region {
            pref.region = Some(region.clone());
        }
        if let Some(tag) = &self.tag {
            pref.tag = Some(tag.clone());
        }
        if let Some(hour) = self.delivery_hour {
            pref.delivery_hour = hour;
        }
        if let Some(days) = self.delivery_days {
            pref.delivery_days = days;
        }
        if let Some(subscribed) = self.subscribed {
            pref.subscribed = subscribed;
        }
        if let Some(daily) = self.daily_digest {
            pref.daily_digest = daily;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_only_touches_supplied_fields() {
        let mut pref = UserPreference::with_defaults(1, "t0");
        pref.delivery_hour = 7;
        PreferenceUpdate::new().tag("Leo").apply_to(&mut pref);
        assert_eq!(pref.tag.as_deref(), Some("Leo"));
        assert_eq!(pref.delivery_hour, 7);
        assert!(pref.delivery_days.is_all());
    }

    #[test]
    fn hour_out_of_range_is_invalid() {
        let err = PreferenceUpdate::new().delivery_hour(24).validate().unwrap_err();
        assert!(matches!(err, PrefsError::InvalidField { field: "delivery_hour", .. }));
    }

    #[test]
    fn empty_update_is_empty() {
        assert!(PreferenceUpdate::new().is_empty());
        assert!(!PreferenceUpdate::new().subscribed(true).is_empty());
    }
}

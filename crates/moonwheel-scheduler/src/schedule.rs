//! Eligibility rules. Pure functions of (preference, region, now).

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};

use moonwheel_calendar::{days_until, next_recurring_date, RecurringDate};
use moonwheel_core::RegionProfile;
use moonwheel_prefs::UserPreference;

/// Marker kind for the daily digest.
pub const DAILY_DIGEST_KIND: &str = "daily_digest";

/// Marker kind for one (event, lead) bucket, e.g. `event:Samhain:7`.
pub fn alert_kind(event_name: &str, lead_days: i64) -> String {
    format!("event:{}:{}", event_name, lead_days)
}

/// The user's local date if the digest is due this hour, else `None`.
///
/// Due means: digest enabled, local weekday in the chosen days and local hour
/// equal to the delivery hour. Every minute of that hour qualifies; the
/// delivery marker keyed by the returned date keeps it to one send.
pub fn digest_due(
    pref: &UserPreference,
    region: &RegionProfile,
    now: DateTime<Utc>,
) -> Option<NaiveDate> {
    if !pref.subscribed || !pref.daily_digest {
        return None;
    }
    let local = now.with_timezone(&region.timezone);
    if !pref.delivery_days.contains(local.weekday()) {
        return None;
    }
    if local.hour() != u32::from(pref.delivery_hour) {
        return None;
    }
    Some(local.date_naive())
}

/// The upcoming event and its lead time if an alert is due, else `None`.
///
/// Alerts wait until the local hour reaches the delivery hour, then stay due
/// for the rest of that local day. Delivery days do not apply.
pub fn alert_due(
    pref: &UserPreference,
    region: &RegionProfile,
    now: DateTime<Utc>,
    lead_days: &[u32],
) -> Option<(RecurringDate, i64)> {
    if !pref.subscribed {
        return None;
    }
    let local = now.with_timezone(&region.timezone);
    if local.hour() < u32::from(pref.delivery_hour) {
        return None;
    }
    let today = local.date_naive();
    let event = next_recurring_date(region.hemisphere, today);
    let lead = days_until(today, event.date);
    let wanted = u32::try_from(lead).map(|l| lead_days.contains(&l)).unwrap_or(false);
    wanted.then_some((event, lead))
}

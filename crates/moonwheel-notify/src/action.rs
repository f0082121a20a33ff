//! Follow-up buttons attached to notifications.
//!
//! An action carries only what it needs to recompute its answer (at most a
//! region key), so a button from a months-old message still works.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use moonwheel_calendar::{days_until, next_full_moon, next_recurring_date, phase_at};
use moonwheel_core::{RegionCatalog, RegionProfile};
use moonwheel_prefs::ContentPool;

use crate::compose::{format_date, relative_days};
use crate::error::{NotifyError, Result};
use crate::payload::NotificationPayload;

pub const CUSTOM_ID_PREFIX: &str = "mw:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FollowUpAction {
    NextEvent { region: String },
    NextFullMoon { region: String },
    Inspiration,
}

impl FollowUpAction {
    pub fn custom_id(&self) -> String {
        match self {
            FollowUpAction::NextEvent { region } => format!("{CUSTOM_ID_PREFIX}event:{region}"),
            FollowUpAction::NextFullMoon { region } => format!("{CUSTOM_ID_PREFIX}moon:{region}"),
            FollowUpAction::Inspiration => format!("{CUSTOM_ID_PREFIX}inspire"),
        }
    }

    /// Decode a component custom id; `None` if it is not a follow-up action.
    pub fn parse(custom_id: &str) -> Option<FollowUpAction> {
        let rest = custom_id.strip_prefix(CUSTOM_ID_PREFIX)?;
        if rest == "inspire" {
            return Some(FollowUpAction::Inspiration);
        }
        let (kind, region) = rest.split_once(':')?;
        if region.is_empty() {
            return None;
        }
        let region = region.to_string();
        match kind {
            "event" => Some(FollowUpAction::NextEvent { region }),
            "moon" => Some(FollowUpAction::NextFullMoon { region }),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FollowUpAction::NextEvent { .. } => "Next Sabbat",
            FollowUpAction::NextFullMoon { .. } => "Next Full Moon",
            FollowUpAction::Inspiration => "Random Quote / Prompt",
        }
    }
}

impl fmt::Display for FollowUpAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.custom_id())
    }
}

fn lookup<'a>(catalog: &'a RegionCatalog, key: &str) -> Result<&'a RegionProfile> {
    catalog.get(key).ok_or_else(|| NotifyError::UnknownRegion {
        key: key.to_string(),
    })
}

/// Recompute the answer for `action` from current data. Replies are
/// ephemeral.
pub fn resolve_action(
    action: &FollowUpAction,
    catalog: &RegionCatalog,
    content: &ContentPool,
    now: DateTime<Utc>,
) -> Result<NotificationPayload> {
    let payload = match action {
        FollowUpAction::NextEvent { region } => {
            let region = lookup(catalog, region)?;
            let today = now.with_timezone(&region.timezone).date_naive();
            let event = next_recurring_date(region.hemisphere, today);
            NotificationPayload::notice(format!(
                "{} Next Sabbat: **{}** on **{}** ({})\nRegion: **{}** | Timezone: **{}**",
                region.emoji,
                event.name,
                format_date(event.date),
                relative_days(days_until(today, event.date)),
                region.name,
                region.timezone.name(),
            ))
            .color(region.color)
        }
        FollowUpAction::NextFullMoon { region } => {
            let region = lookup(catalog, region)?;
            let date = next_full_moon(region.timezone, now);
            NotificationPayload::notice(format!(
                "{} Next Full Moon: **{}** {}\nRegion: **{}** | Timezone: **{}**",
                region.emoji,
                format_date(date),
                phase_at(now).emoji(),
                region.name,
                region.timezone.name(),
            ))
            .color(region.color)
        }
        FollowUpAction::Inspiration => NotificationPayload::notice(format!(
            "\u{1f4ab} Quote: {}\n\u{1f4dd} Journal Prompt: {}",
            content.random_quote()?,
            content.random_prompt()?,
        )),
    };
    Ok(payload)
}

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use tracing::debug;

use moonwheel_calendar::{days_until, next_full_moon, next_recurring_date, phase_at, RecurringDate};
use moonwheel_core::RegionProfile;
use moonwheel_prefs::{ContentPool, UserPreference};

use crate::action::FollowUpAction;
use crate::error::Result;
use crate::payload::NotificationPayload;

/// `16 October 2026`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}

/// `today`, `tomorrow` or `in N days`.
pub fn relative_days(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n => format!("in {} days", n),
    }
}

fn greeting(local_hour: u32, name: Option<&str>) -> String {
    let (part, icon) = match local_hour {
        5..=11 => ("morning", "\u{1f31e}"),
        12..=17 => ("afternoon", "\u{1f33b}"),
        _ => ("evening", "\u{1f319}"),
    };
    match name {
        Some(name) => format!("Good {}, {}! {}", part, name, icon),
        None => format!("Good {}! {}", part, icon),
    }
}

fn region_line(region: &RegionProfile) -> String {
    format!("Region: **{}** | Timezone: **{}**", region.name, region.timezone.name())
}

/// The stateless buttons attached to every digest.
pub fn default_actions(region: &RegionProfile) -> Vec<FollowUpAction> {
    vec![
        FollowUpAction::NextEvent {
            region: region.key.clone(),
        },
        FollowUpAction::NextFullMoon {
            region: region.key.clone(),
        },
        FollowUpAction::Inspiration,
    ]
}

/// Builds notification payloads from calendar answers and the content pools.
#[derive(Clone)]
pub struct Composer {
    content: ContentPool,
}

impl Composer {
    pub fn new(content: ContentPool) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &ContentPool {
        &self.content
    }

    /// The daily digest for `pref`, localised to `region`.
    pub fn compose(
        &self,
        pref: &UserPreference,
        region: &RegionProfile,
        now: DateTime<Utc>,
    ) -> Result<NotificationPayload> {
        let local = now.with_timezone(&region.timezone);
        let today = local.date_naive();

        let quote = self.content.random_quote()?;
        let prompt = self.content.random_prompt()?;
        let event = next_recurring_date(region.hemisphere, today);
        let full_moon = next_full_moon(region.timezone, now);
        let phase = phase_at(now);

        debug!(user_id = pref.user_id, region = %region.key, event = event.name, "composing digest");

        let body = format!(
            "{}\nToday is **{}**\n{}\n\n\u{1f4ab} Quote: {}\n\u{1f4dd} Journal Prompt: {}",
            greeting(local.hour(), pref.display_name.as_deref()),
            format_date(today),
            region_line(region),
            quote,
            prompt,
        );

        Ok(
            NotificationPayload::new(format!("{} Daily Reminder", region.emoji), body)
                .color(region.color)
                .field(
                    "Next Sabbat",
                    format!(
                        "**{}** on {} ({})",
                        event.name,
                        format_date(event.date),
                        relative_days(days_until(today, event.date))
                    ),
                    true,
                )
                .field(
                    "Next Full Moon",
                    format!("{} {}", format_date(full_moon), phase.emoji()),
                    true,
                )
                .actions(default_actions(region)),
        )
    }

    /// Lead-time alert for an upcoming seasonal event.
    pub fn compose_event_alert(
        &self,
        region: &RegionProfile,
        event: &RecurringDate,
        lead_days: i64,
    ) -> NotificationPayload {
        let title = if lead_days == 0 {
            format!("{} {} is today", region.emoji, event.name)
        } else {
            format!("{} {} is coming", region.emoji, event.name)
        };
        let body = format!(
            "**{}** falls on **{}**, {}.\n{}",
            event.name,
            format_date(event.date),
            relative_days(lead_days),
            region_line(region),
        );
        NotificationPayload::new(title, body)
            .color(region.color)
            .actions(vec![
                FollowUpAction::NextFullMoon {
                    region: region.key.clone(),
                },
                FollowUpAction::Inspiration,
            ])
    }
}

//! Rendering of notification payloads and onboarding prompts as Discord
//! embeds and button rows.
//!
//! A payload with neither title, fields nor colour is sent as plain text;
//! anything richer becomes a single embed. Buttons are laid out five to a row
//! and anything past the fifth row is dropped.

use serenity::builder::{
    CreateActionRow, CreateButton, CreateEmbed, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateMessage,
};
use serenity::model::application::ButtonStyle;
use serenity::model::channel::ReactionType;

use moonwheel_notify::{FollowUpAction, NotificationPayload};
use moonwheel_onboarding::{OnboardingPrompt, PromptOption};

const BUTTONS_PER_ROW: usize = 5;
const MAX_ROWS: usize = 5;
const MAX_LABEL_CHARS: usize = 80;

/// Used when a payload carries no accent colour of its own.
pub const DEFAULT_COLOR: u32 = 0x9b59b6;

/// Convert a payload to a serenity `CreateEmbed` builder.
pub fn to_create_embed(payload: &NotificationPayload) -> CreateEmbed {
    let mut e = CreateEmbed::new().colour(payload.color.unwrap_or(DEFAULT_COLOR));
    if !payload.body.is_empty() {
        e = e.description(&payload.body);
    }
    if !payload.title.is_empty() {
        e = e.title(&payload.title);
    }
    for field in &payload.fields {
        e = e.field(&field.name, &field.value, field.inline);
    }
    e
}

fn is_plain(payload: &NotificationPayload) -> bool {
    payload.title.is_empty() && payload.fields.is_empty() && payload.color.is_none()
}

fn truncate_label(label: &str) -> String {
    label.chars().take(MAX_LABEL_CHARS).collect()
}

fn into_rows(buttons: Vec<CreateButton>) -> Vec<CreateActionRow> {
    buttons
        .chunks(BUTTONS_PER_ROW)
        .take(MAX_ROWS)
        .map(|row| CreateActionRow::Buttons(row.to_vec()))
        .collect()
}

fn action_button(action: &FollowUpAction) -> CreateButton {
    let (style, emoji) = match action {
        FollowUpAction::NextEvent { .. } => (ButtonStyle::Primary, "\u{1f4c5}"),
        FollowUpAction::NextFullMoon { .. } => (ButtonStyle::Secondary, "\u{1f315}"),
        FollowUpAction::Inspiration => (ButtonStyle::Success, "\u{2728}"),
    };
    CreateButton::new(action.custom_id())
        .label(action.label())
        .style(style)
        .emoji(ReactionType::Unicode(emoji.to_string()))
}

fn option_button(option: &PromptOption) -> CreateButton {
    let style = if option.custom_id.ends_with(":cancel") {
        ButtonStyle::Danger
    } else {
        ButtonStyle::Primary
    };
    let mut button = CreateButton::new(&option.custom_id)
        .label(truncate_label(&option.label))
        .style(style);
    if let Some(emoji) = &option.emoji {
        button = button.emoji(ReactionType::Unicode(emoji.clone()));
    }
    button
}

/// Button rows for a payload's follow-up actions.
pub fn action_rows(actions: &[FollowUpAction]) -> Vec<CreateActionRow> {
    into_rows(actions.iter().map(action_button).collect())
}

/// Button rows for one onboarding step.
pub fn prompt_rows(options: &[PromptOption]) -> Vec<CreateActionRow> {
    into_rows(options.iter().map(option_button).collect())
}

/// Direct-message form of a payload.
pub fn to_message(payload: &NotificationPayload) -> CreateMessage {
    let msg = if is_plain(payload) {
        CreateMessage::new().content(&payload.body)
    } else {
        CreateMessage::new().embed(to_create_embed(payload))
    };
    msg.components(action_rows(&payload.actions))
}

/// Initial interaction response form of a payload.
pub fn to_interaction_message(payload: &NotificationPayload) -> CreateInteractionResponseMessage {
    let msg = if is_plain(payload) {
        CreateInteractionResponseMessage::new().content(&payload.body)
    } else {
        CreateInteractionResponseMessage::new().embed(to_create_embed(payload))
    };
    msg.components(action_rows(&payload.actions))
        .ephemeral(payload.ephemeral)
}

/// Follow-up form of a payload, for interactions that were already answered.
pub fn to_followup(payload: &NotificationPayload) -> CreateInteractionResponseFollowup {
    let msg = if is_plain(payload) {
        CreateInteractionResponseFollowup::new().content(&payload.body)
    } else {
        CreateInteractionResponseFollowup::new().embed(to_create_embed(payload))
    };
    msg.components(action_rows(&payload.actions))
        .ephemeral(payload.ephemeral)
}

/// An onboarding step: prompt text plus one button per option.
pub fn prompt_message(prompt: &OnboardingPrompt) -> CreateInteractionResponseMessage {
    CreateInteractionResponseMessage::new()
        .content(&prompt.text)
        .components(prompt_rows(&prompt.options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use moonwheel_onboarding::Step;

    fn buttons_per_row(rows: &[CreateActionRow]) -> Vec<usize> {
        rows.iter()
            .map(|row| match row {
                CreateActionRow::Buttons(b) => b.len(),
                _ => 0,
            })
            .collect()
    }

    fn option(i: usize) -> PromptOption {
        PromptOption {
            custom_id: format!("onboard:tag:t{i}"),
            label: format!("Tag {i}"),
            emoji: None,
        }
    }

    #[test]
    fn twelve_tags_and_cancel_fill_three_rows() {
        let prompt = OnboardingPrompt {
            step: Step::AwaitingTag,
            text: "Pick one".into(),
            options: (0..13).map(option).collect(),
        };
        assert_eq!(buttons_per_row(&prompt_rows(&prompt.options)), vec![5, 5, 3]);
    }

    #[test]
    fn overflowing_options_are_capped_at_five_rows() {
        let options: Vec<_> = (0..40).map(option).collect();
        assert_eq!(buttons_per_row(&prompt_rows(&options)), vec![5; 5]);
    }

    #[test]
    fn long_labels_are_truncated() {
        assert_eq!(truncate_label(&"x".repeat(120)).chars().count(), 80);
    }

    #[test]
    fn embed_carries_title_body_and_fields() {
        let payload = NotificationPayload::new("\u{1f319} Daily Reminder", "Today is **1 May 2026**")
            .color(0x2ecc71)
            .field("Next Sabbat", "Litha", true);
        let json = serde_json::to_value(to_create_embed(&payload)).unwrap();
        assert_eq!(json["title"], "\u{1f319} Daily Reminder");
        assert_eq!(json["description"], "Today is **1 May 2026**");
        assert_eq!(json["fields"].as_array().map(|f| f.len()), Some(1));
    }

    #[test]
    fn bare_notice_is_plain_text() {
        assert!(is_plain(&NotificationPayload::notice("Saved.")));
        assert!(!is_plain(&NotificationPayload::notice("Saved.").color(1)));
    }

    #[test]
    fn digest_actions_render_one_row() {
        let actions = vec![
            FollowUpAction::NextEvent {
                region: "europe".into(),
            },
            FollowUpAction::NextFullMoon {
                region: "europe".into(),
            },
            FollowUpAction::Inspiration,
        ];
        assert_eq!(buttons_per_row(&action_rows(&actions)), vec![3]);
        assert!(action_rows(&[]).is_empty());
    }
}

//! Button clicks, routed by custom-id prefix.
//!
//! `onboard:*` drives the setup wizard and edits the prompt message in place.
//! `mw:*` is a follow-up action from a notification; its answer is recomputed
//! from current data and sent as an ephemeral reply.

use std::sync::Arc;

use chrono::Utc;
use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::model::application::ComponentInteraction;
use serenity::prelude::Context;
use tracing::{debug, warn};

use moonwheel_core::RegionCatalog;
use moonwheel_notify::{
    resolve_action, DeliveryResult, Destination, FollowUpAction, NotificationPayload, NotifyError,
};
use moonwheel_onboarding::{Choice, OnboardingOutcome, OnboardingPrompt};
use moonwheel_prefs::UserPreference;

use crate::commands::{describe_schedule, interaction_handle};
use crate::context::DiscordAppContext;
use crate::embed;
use crate::error::Result;

/// Dispatch a component interaction to the appropriate handler.
pub async fn handle_component<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    ctx: &Context,
    component: &ComponentInteraction,
) {
    let custom_id = component.data.custom_id.as_str();
    debug!(user_id = %component.user.id, custom_id, "component interaction");

    let result = if let Some(choice) = Choice::parse(custom_id) {
        handle_onboarding(app, ctx, component, &choice).await
    } else if let Some(action) = FollowUpAction::parse(custom_id) {
        handle_action(app, component, &action).await
    } else {
        warn!(user_id = %component.user.id, custom_id, "unrecognised component");
        respond_ephemeral(ctx, component, "This button is no longer supported.").await;
        Ok(())
    };

    if let Err(e) = result {
        warn!(custom_id, user_id = %component.user.id, error = %e, "component interaction error");
        respond_ephemeral(
            ctx,
            component,
            "\u{26a0}\u{fe0f} Something went wrong. Please try again later.",
        )
        .await;
    }
}

/// The message that replaces the wizard prompt after a click.
pub(crate) fn onboarding_message(
    outcome: OnboardingOutcome,
    catalog: &RegionCatalog,
) -> CreateInteractionResponseMessage {
    let done = |text: &str| {
        CreateInteractionResponseMessage::new()
            .content(text)
            .components(Vec::new())
    };
    let with_notice = |notice: &str, prompt: &OnboardingPrompt| {
        embed::prompt_message(prompt).content(format!("\u{26a0}\u{fe0f} {}\n\n{}", notice, prompt.text))
    };

    match outcome {
        OnboardingOutcome::Prompt(prompt) => embed::prompt_message(&prompt),
        OnboardingOutcome::Completed(pref) => done(&completion_text(&pref, catalog)),
        OnboardingOutcome::Cancelled => done("Onboarding cancelled. Nothing was saved."),
        OnboardingOutcome::Expired => {
            done("\u{231b} This setup timed out. Run `/onboard` to start again.")
        }
        OnboardingOutcome::NoSession => {
            done("There is no setup in progress. Run `/onboard` to start.")
        }
        OnboardingOutcome::PersistFailed(prompt) => {
            with_notice("Could not save your choices. Please answer again.", &prompt)
        }
        OnboardingOutcome::Rejected { reason, prompt } => with_notice(&reason, &prompt),
    }
}

fn completion_text(pref: &UserPreference, catalog: &RegionCatalog) -> String {
    let region = pref
        .region
        .as_deref()
        .and_then(|key| catalog.get(key))
        .map(|r| format!("{} {}", r.emoji, r.name))
        .unwrap_or_default();
    let daily = if pref.daily_digest {
        format!(
            "Your daily reminder arrives at {}.",
            describe_schedule(pref, catalog)
        )
    } else {
        "Daily reminders are off; you will still get seasonal alerts.".to_string()
    };
    format!(
        "\u{2705} All set! Region: **{}** | Sign: **{}**\n{}\nUse `/schedule` to change the time or `/profile` to review.",
        region,
        pref.tag.as_deref().unwrap_or("none"),
        daily,
    )
}

async fn handle_onboarding<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    ctx: &Context,
    component: &ComponentInteraction,
    choice: &Choice,
) -> Result<()> {
    let outcome = app
        .onboarding()
        .handle(component.user.id.get(), choice, Utc::now());
    let message = onboarding_message(outcome, app.catalog());
    component
        .create_response(&ctx.http, CreateInteractionResponse::UpdateMessage(message))
        .await?;
    Ok(())
}

async fn handle_action<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    component: &ComponentInteraction,
    action: &FollowUpAction,
) -> Result<()> {
    let payload = match resolve_action(action, app.catalog(), app.content(), Utc::now()) {
        Ok(payload) => payload,
        Err(NotifyError::UnknownRegion { key }) => {
            warn!(user_id = %component.user.id, region = %key, "follow-up for unknown region");
            NotificationPayload::notice("That region is no longer available. Run `/onboard` to pick another.")
        }
        Err(e) => return Err(e.into()),
    };

    let handle = interaction_handle(
        component.id.get(),
        &component.token,
        component.user.id.get(),
    );
    let result = app
        .gateway()
        .deliver(&Destination::Interaction(handle), &payload)
        .await;
    if result != DeliveryResult::Ok {
        warn!(user_id = %component.user.id, %action, ?result, "follow-up reply not delivered");
    }
    Ok(())
}

async fn respond_ephemeral(ctx: &Context, component: &ComponentInteraction, content: &str) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );
    if let Err(e) = component.create_response(&ctx.http, response).await {
        warn!(custom_id = %component.data.custom_id, error = %e, "failed to send ephemeral response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moonwheel_prefs::PreferenceUpdate;

    fn completed(daily: bool) -> UserPreference {
        let mut pref = UserPreference::with_defaults(7, "t");
        PreferenceUpdate::new()
            .region("south-america")
            .tag("Leo")
            .daily_digest(daily)
            .subscribed(true)
            .apply_to(&mut pref);
        pref
    }

    #[test]
    fn completion_summarises_choices() {
        let text = completion_text(&completed(true), &RegionCatalog::builtin());
        assert!(text.contains("South America"));
        assert!(text.contains("Leo"));
        assert!(text.contains("09:00 America/Sao_Paulo"));
    }

    #[test]
    fn completion_without_digest_mentions_alerts() {
        let text = completion_text(&completed(false), &RegionCatalog::builtin());
        assert!(text.contains("seasonal alerts"));
        assert!(!text.contains("09:00"));
    }

    #[test]
    fn terminal_outcomes_clear_buttons() {
        let msg = onboarding_message(OnboardingOutcome::Cancelled, &RegionCatalog::builtin());
        let json = serde_json::to_value(msg).unwrap();
        assert_eq!(json["components"].as_array().map(|c| c.len()), Some(0));
    }
}

//! Discord slash commands.
//!
//! Registration happens in `ready()` when `config.slash_commands` is true.
//! Interactions are dispatched from `interaction_create` in the event handler.
//! Replies go through the dispatch gateway so a double acknowledgement falls
//! back to a follow-up; onboarding prompts are answered directly because
//! their buttons replace the message in place.

use std::sync::Arc;

use chrono::Utc;
use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};
use serenity::model::application::{Command, CommandInteraction, CommandOptionType};
use serenity::model::id::GuildId;
use serenity::prelude::Context;
use tracing::{info, warn};

use moonwheel_core::{DeliveryDays, RegionCatalog};
use moonwheel_notify::{DeliveryResult, Destination, InteractionHandle, NotificationPayload};
use moonwheel_prefs::{PoolKind, PrefsError, PreferenceUpdate, UserPreference};

use crate::context::DiscordAppContext;
use crate::embed;
use crate::error::Result;

const HELP_COLOR: u32 = 0x9b59b6;
const STATUS_COLOR: u32 = 0x3498db;

/// Every command the bot registers, with its options.
pub fn command_list() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("onboard")
            .description("Choose your region, sign and daily reminder setting"),
        CreateCommand::new("reminder").description("Get your daily reminder right now"),
        CreateCommand::new("submit_quote")
            .description("Submit an inspirational quote")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "quote", "The quote text")
                    .required(true),
            ),
        CreateCommand::new("submit_prompt")
            .description("Submit a journal prompt")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "prompt", "The prompt text")
                    .required(true),
            ),
        CreateCommand::new("subscribe").description("Start receiving reminders"),
        CreateCommand::new("unsubscribe").description("Stop receiving reminders"),
        CreateCommand::new("schedule")
            .description("Change when your daily reminder arrives")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "hour",
                    "Local hour, 0-23",
                )
                .required(true)
                .min_int_value(0)
                .max_int_value(23),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "days",
                    "e.g. \"Mon,Wed,Fri\", \"weekdays\", \"weekends\" or \"daily\"",
                )
                .required(false),
            ),
        CreateCommand::new("profile").description("Show your stored preferences"),
        CreateCommand::new("clear_data").description("Delete everything stored about you"),
        CreateCommand::new("help").description("Show all available commands"),
        CreateCommand::new("status").description("Show bot version and statistics"),
    ]
}

/// Register slash commands on one guild, or globally. Call from `ready()`.
pub async fn register_commands(ctx: &Context, guild_id: Option<GuildId>) {
    let commands = command_list();

    match guild_id {
        Some(gid) => match gid.set_commands(&ctx.http, commands).await {
            Ok(cmds) => info!(guild = %gid, count = cmds.len(), "registered guild slash commands"),
            Err(e) => warn!(guild = %gid, error = %e, "failed to register guild commands"),
        },
        None => match Command::set_global_commands(&ctx.http, commands).await {
            Ok(cmds) => info!(count = cmds.len(), "registered global slash commands"),
            Err(e) => warn!(error = %e, "failed to register global slash commands"),
        },
    }
}

/// Dispatch a slash command interaction to the appropriate handler.
pub async fn handle_interaction<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    ctx: &Context,
    command: &CommandInteraction,
) {
    let result = match command.data.name.as_str() {
        "onboard" => handle_onboard(app, ctx, command).await,
        "reminder" => handle_reminder(app, command).await,
        "submit_quote" => handle_submit(app, command, PoolKind::Quote, "quote").await,
        "submit_prompt" => handle_submit(app, command, PoolKind::Prompt, "prompt").await,
        "subscribe" => handle_subscribe(app, command).await,
        "unsubscribe" => handle_unsubscribe(app, command).await,
        "schedule" => handle_schedule(app, command).await,
        "profile" => handle_profile(app, command).await,
        "clear_data" => handle_clear_data(app, command).await,
        "help" => {
            reply(app.as_ref(), command, help_payload()).await;
            Ok(())
        }
        "status" => handle_status(app, command).await,
        _ => {
            respond_ephemeral(ctx, command, "Unknown command.").await;
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!(command = %command.data.name, user_id = %command.user.id, error = %e, "slash command error");
        respond_ephemeral(
            ctx,
            command,
            "\u{26a0}\u{fe0f} Something went wrong. Please try again later.",
        )
        .await;
    }
}

pub(crate) fn interaction_handle(id: u64, token: &str, user_id: u64) -> InteractionHandle {
    InteractionHandle {
        id,
        token: token.to_string(),
        user_id,
    }
}

/// Send `payload` as the reply to `command` through the dispatch gateway.
async fn reply<C: DiscordAppContext>(
    app: &C,
    command: &CommandInteraction,
    payload: NotificationPayload,
) {
    let handle = interaction_handle(command.id.get(), &command.token, command.user.id.get());
    let result = app
        .gateway()
        .deliver(&Destination::Interaction(handle), &payload)
        .await;
    if result != DeliveryResult::Ok {
        warn!(command = %command.data.name, user_id = %command.user.id, ?result, "command reply not delivered");
    }
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
}

fn option_i64(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_i64())
}

/// `09:00 Europe/London, every day`
pub(crate) fn describe_schedule(pref: &UserPreference, catalog: &RegionCatalog) -> String {
    let tz = pref
        .region
        .as_deref()
        .and_then(|key| catalog.get(key))
        .map(|r| r.timezone.name().to_string())
        .unwrap_or_else(|| "your region's time".to_string());
    format!("{:02}:00 {}, {}", pref.delivery_hour, tz, pref.delivery_days)
}

/// `/onboard`: start (or restart) the setup wizard.
async fn handle_onboard<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let prompt = app.onboarding().start(
        command.user.id.get(),
        Some(command.user.display_name()),
        Utc::now(),
    );
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(embed::prompt_message(&prompt).ephemeral(true)),
        )
        .await?;
    Ok(())
}

/// `/reminder`: the daily digest, composed now and sent as the reply.
async fn handle_reminder<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    command: &CommandInteraction,
) -> Result<()> {
    let user_id = command.user.id.get();
    let pref = app.store().get(user_id)?;

    let payload = match pref {
        None => NotificationPayload::notice(
            "\u{26a0}\u{fe0f} You have not set up reminders yet. Use `/onboard` to choose your region.",
        ),
        Some(pref) if !pref.subscribed => NotificationPayload::notice(
            "\u{26a0}\u{fe0f} You are not subscribed. Use `/subscribe` or `/onboard`.",
        ),
        Some(pref) => match pref.region.as_deref().and_then(|key| app.catalog().get(key)) {
            Some(region) => app.composer().compose(&pref, region, Utc::now())?,
            None => NotificationPayload::notice(
                "\u{26a0}\u{fe0f} Region not set. Please complete `/onboard`.",
            ),
        },
    };

    reply(app.as_ref(), command, payload).await;
    Ok(())
}

/// `/submit_quote` and `/submit_prompt`.
async fn handle_submit<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    command: &CommandInteraction,
    kind: PoolKind,
    option: &str,
) -> Result<()> {
    let text = option_str(command, option).unwrap_or("");
    let payload = match app.content().submit(kind, text, command.user.id.get()) {
        Ok(id) => {
            info!(user_id = %command.user.id, %kind, id, "content submitted");
            let what = match kind {
                PoolKind::Quote => "Quote",
                PoolKind::Prompt => "Journal prompt",
            };
            NotificationPayload::notice(format!("\u{2705} {} submitted. Thank you!", what))
        }
        Err(PrefsError::InvalidField { reason, .. }) => {
            NotificationPayload::notice(format!("\u{26a0}\u{fe0f} {}", reason))
        }
        Err(e) => return Err(e.into()),
    };
    reply(app.as_ref(), command, payload).await;
    Ok(())
}

/// `/subscribe`: only meaningful once a region has been chosen.
async fn handle_subscribe<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    command: &CommandInteraction,
) -> Result<()> {
    let user_id = command.user.id.get();
    let has_region = app
        .store()
        .get(user_id)?
        .is_some_and(|p| p.region.is_some());

    let payload = if has_region {
        let update = PreferenceUpdate::new()
            .subscribed(true)
            .display_name(command.user.display_name());
        let pref = app.store().upsert(user_id, &update)?;
        NotificationPayload::notice(format!(
            "\u{2705} Subscribed. Reminders arrive at {}.",
            describe_schedule(&pref, app.catalog())
        ))
    } else {
        NotificationPayload::notice(
            "Use `/onboard` first so I know which region's calendar to follow.",
        )
    };
    reply(app.as_ref(), command, payload).await;
    Ok(())
}

/// `/unsubscribe`: never creates a record for an unknown user.
async fn handle_unsubscribe<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    command: &CommandInteraction,
) -> Result<()> {
    let user_id = command.user.id.get();
    if app.store().get(user_id)?.is_some() {
        app.store().set_subscription(user_id, false)?;
    }
    reply(
        app.as_ref(),
        command,
        NotificationPayload::notice("\u{274c} You have unsubscribed from reminders."),
    )
    .await;
    Ok(())
}

/// `/schedule hour [days]`
async fn handle_schedule<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    command: &CommandInteraction,
) -> Result<()> {
    let payload = match parse_schedule(option_i64(command, "hour"), option_str(command, "days")) {
        Ok(update) => {
            let update = update.display_name(command.user.display_name());
            let pref = app.store().upsert(command.user.id.get(), &update)?;
            NotificationPayload::notice(format!(
                "\u{1f552} Reminders will arrive at {}.",
                describe_schedule(&pref, app.catalog())
            ))
        }
        Err(reason) => NotificationPayload::notice(format!("\u{26a0}\u{fe0f} {}", reason)),
    };
    reply(app.as_ref(), command, payload).await;
    Ok(())
}

fn parse_schedule(
    hour: Option<i64>,
    days: Option<&str>,
) -> std::result::Result<PreferenceUpdate, String> {
    let hour = hour
        .and_then(|h| u8::try_from(h).ok())
        .filter(|h| *h < 24)
        .ok_or_else(|| "Hour must be between 0 and 23.".to_string())?;
    let mut update = PreferenceUpdate::new().delivery_hour(hour);
    if let Some(raw) = days.filter(|d| !d.trim().is_empty()) {
        let days = DeliveryDays::parse_list(raw)?;
        if days.is_empty() {
            return Err("Pick at least one day.".to_string());
        }
        update = update.delivery_days(days);
    }
    Ok(update)
}

/// `/profile`
async fn handle_profile<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    command: &CommandInteraction,
) -> Result<()> {
    let payload = match app.store().get(command.user.id.get())? {
        Some(pref) => profile_payload(&pref, app.catalog()),
        None => NotificationPayload::notice("Nothing stored yet. Use `/onboard` to get started."),
    };
    reply(app.as_ref(), command, payload).await;
    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn profile_payload(pref: &UserPreference, catalog: &RegionCatalog) -> NotificationPayload {
    let region = pref.region.as_deref().and_then(|key| catalog.get(key));
    let region_text = match (region, pref.region.as_deref()) {
        (Some(r), _) => format!("{} {}", r.emoji, r.name),
        (None, Some(key)) => format!("{} (no longer available)", key),
        (None, None) => "not set".to_string(),
    };
    let mut payload = NotificationPayload::new("\u{1f319} Your Preferences", String::new())
        .ephemeral()
        .field("Region", region_text, true)
        .field("Sign", pref.tag.as_deref().unwrap_or("not set"), true)
        .field("Delivery", describe_schedule(pref, catalog), false)
        .field("Subscribed", on_off(pref.subscribed), true)
        .field("Daily reminder", on_off(pref.daily_digest), true);
    if let Some(r) = region {
        payload = payload.color(r.color);
    }
    payload
}

/// `/clear_data`: drops the record, its delivery markers and any wizard in
/// progress.
async fn handle_clear_data<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    command: &CommandInteraction,
) -> Result<()> {
    let user_id = command.user.id.get();
    if app.onboarding().has_session(user_id) {
        app.onboarding()
            .handle(user_id, &moonwheel_onboarding::Choice::Cancel, Utc::now());
    }
    let removed = app.store().delete(user_id)?;
    info!(user_id, removed, "user data cleared");
    let text = if removed {
        "\u{1f5d1}\u{fe0f} Your preferences have been deleted. Run `/onboard` to start again."
    } else {
        "Nothing was stored about you."
    };
    reply(app.as_ref(), command, NotificationPayload::notice(text)).await;
    Ok(())
}

fn help_payload() -> NotificationPayload {
    [
        ("/onboard", "Choose your region, sign and whether you want a daily reminder."),
        ("/reminder", "Receive your daily reminder immediately."),
        ("/schedule <hour> [days]", "Change the local hour and days of your daily reminder."),
        ("/subscribe", "Resume reminders."),
        ("/unsubscribe", "Stop all reminders."),
        ("/profile", "Show what is stored about you."),
        ("/submit_quote <text>", "Add an inspirational quote to the pool."),
        ("/submit_prompt <text>", "Add a journal prompt to the pool."),
        ("/clear_data", "Delete your preferences."),
        ("/status", "Bot version and statistics."),
    ]
    .into_iter()
    .fold(
        NotificationPayload::new("\u{1f319} Moonwheel Help", "All replies are only visible to you.")
            .color(HELP_COLOR)
            .ephemeral(),
        |payload, (name, value)| payload.field(name, value, false),
    )
}

/// `/status`: version, uptime and store counts.
async fn handle_status<C: DiscordAppContext + 'static>(
    app: &Arc<C>,
    command: &CommandInteraction,
) -> Result<()> {
    let (users, subscribed) = app.store().count_users()?;
    let (quotes, prompts) = app.content().counts()?;
    let uptime = Utc::now() - app.started_at();

    let payload = NotificationPayload::new(
        "\u{1f916} Moonwheel Status",
        format!("Version **{}**", env!("CARGO_PKG_VERSION")),
    )
    .color(STATUS_COLOR)
    .ephemeral()
    .field(
        "Uptime",
        format!(
            "{}d {}h {}m",
            uptime.num_days(),
            uptime.num_hours() % 24,
            uptime.num_minutes() % 60
        ),
        true,
    )
    .field("Users", format!("{} ({} subscribed)", users, subscribed), true)
    .field("Content", format!("{} quotes, {} prompts", quotes, prompts), true)
    .field(
        "Onboarding in progress",
        app.onboarding().active_sessions().to_string(),
        true,
    );
    reply(app.as_ref(), command, payload).await;
    Ok(())
}

/// Send an ephemeral response to a slash command (only visible to the invoker).
async fn respond_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );
    if let Err(e) = command.create_response(&ctx.http, response).await {
        warn!(command = %command.data.name, error = %e, "failed to send ephemeral response");
    }
}

use std::sync::Arc;

use serenity::all::ActivityData;
use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, GuildId};
use serenity::model::user::OnlineStatus;
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, info, warn};

use moonwheel_core::config::DiscordConfig;

use crate::context::DiscordAppContext;

/// Serenity event handler wired to the preference store and scheduler
/// collaborators.
pub struct DiscordHandler<C: DiscordAppContext + 'static> {
    pub ctx: Arc<C>,
    pub config: DiscordConfig,
}

#[async_trait]
impl<C: DiscordAppContext + 'static> EventHandler for DiscordHandler<C> {
    async fn ready(&self, ctx: Context, ready: Ready) {
        // Config-driven presence.
        let status = parse_online_status(&self.config.status);
        let activity = build_activity(&self.config);
        ctx.set_presence(activity, status);

        info!(name = %ready.user.name, guilds = ready.guilds.len(), "Discord bot connected");

        if self.config.slash_commands {
            let guild = self.config.guild_id.filter(|id| *id != 0).map(GuildId::new);
            crate::commands::register_commands(&ctx, guild).await;
        }

        if let Some(channel) = self.config.log_channel_id.filter(|id| *id != 0) {
            let notice = format!(
                "\u{1f319} Moonwheel v{} online as **{}**.",
                env!("CARGO_PKG_VERSION"),
                ready.user.name
            );
            if let Err(e) = ChannelId::new(channel).say(&ctx.http, notice).await {
                warn!(channel, error = %e, "failed to post startup notice");
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) if self.config.slash_commands => {
                crate::commands::handle_interaction(&self.ctx, &ctx, &command).await;
            }
            Interaction::Component(component) => {
                crate::components::handle_component(&self.ctx, &ctx, &component).await;
            }
            other => debug!(kind = ?other.kind(), "ignoring interaction"),
        }
    }
}

/// Parse a config status string into serenity's `OnlineStatus`.
fn parse_online_status(s: &str) -> OnlineStatus {
    match s.to_lowercase().as_str() {
        "idle" => OnlineStatus::Idle,
        "dnd" | "do_not_disturb" => OnlineStatus::DoNotDisturb,
        "invisible" => OnlineStatus::Invisible,
        _ => OnlineStatus::Online,
    }
}

/// Build an `ActivityData` from the Discord config.
fn build_activity(config: &DiscordConfig) -> Option<ActivityData> {
    let name = config.activity_name.as_deref()?;
    let kind = config.activity_type.as_deref().unwrap_or("watching");
    Some(match kind.to_lowercase().as_str() {
        "listening" => ActivityData::listening(name),
        "playing" => ActivityData::playing(name),
        "competing" => ActivityData::competing(name),
        "custom" => ActivityData::custom(name),
        _ => ActivityData::watching(name),
    })
}

use std::sync::Arc;
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::{error, info, warn};

use moonwheel_core::config::DiscordConfig;

use crate::context::DiscordAppContext;
use crate::error::{DiscordError, Result};
use crate::handler::DiscordHandler;

/// Discord gateway adapter.
///
/// Wraps a serenity `Client` and drives the event loop until the process
/// exits, rebuilding the client whenever the gateway drops. Scheduled
/// notifications do not depend on it: they go out over REST.
pub struct DiscordAdapter<C: DiscordAppContext + 'static> {
    ctx: Arc<C>,
    config: DiscordConfig,
}

impl<C: DiscordAppContext + 'static> DiscordAdapter<C> {
    pub fn new(config: &DiscordConfig, ctx: Arc<C>) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(DiscordError::NoToken);
        }
        Ok(Self {
            ctx,
            config: config.clone(),
        })
    }

    /// Connect to Discord and keep reconnecting whenever the gateway drops.
    ///
    /// Never returns; the caller races it against its shutdown signal.
    pub async fn run(self) {
        // Interactions arrive regardless of intents; these cover the DM
        // channels the bot opens and the guild cache used at startup.
        let intents = GatewayIntents::GUILDS | GatewayIntents::DIRECT_MESSAGES;

        loop {
            let mut client = self.build_client_retrying(intents).await;

            info!("Discord: gateway connecting");
            if let Err(e) = client.start().await {
                warn!("Discord: gateway error ({e}), reconnecting in 5s");
            } else {
                info!("Discord: gateway stopped cleanly, reconnecting in 5s");
            }

            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }

    async fn build_client_retrying(&self, intents: GatewayIntents) -> Client {
        loop {
            match self.build_client(intents).await {
                Ok(c) => return c,
                Err(e) => {
                    error!("Discord: connect failed ({e}), retrying in 30s");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        }
    }

    /// Build a fresh serenity `Client` with our event handler.
    async fn build_client(&self, intents: GatewayIntents) -> std::result::Result<Client, serenity::Error> {
        let handler = DiscordHandler {
            ctx: Arc::clone(&self.ctx),
            config: self.config.clone(),
        };

        Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await
    }
}

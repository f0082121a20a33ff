//! [`ChatClient`] over the Discord REST API.
//!
//! Uses `Arc<Http>` only (no gateway), so it keeps working while the
//! gateway connection is being rebuilt.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::CreateInteractionResponse;
use serenity::http::{Http, HttpError};
use serenity::model::id::{ChannelId, InteractionId, UserId};
use tracing::debug;

use moonwheel_notify::{ChatClient, InteractionHandle, NotificationPayload, SendError};

use crate::embed;

/// "Cannot send messages to this user" (DMs closed or bot blocked).
const CANNOT_MESSAGE_USER: isize = 50007;
/// "Interaction has already been acknowledged."
const ALREADY_ACKNOWLEDGED: isize = 40060;

pub struct DiscordChatClient {
    http: Arc<Http>,
}

impl DiscordChatClient {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    /// A client with its own REST handle, independent of any gateway session.
    pub fn from_token(token: &str) -> Self {
        Self::new(Arc::new(Http::new(token)))
    }

    /// Plain-text message to a guild channel (the operator log channel).
    pub async fn post_to_channel(&self, channel_id: u64, text: &str) -> Result<(), SendError> {
        if channel_id == 0 {
            return Err(SendError::Forbidden);
        }
        ChannelId::new(channel_id)
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| classify(&e))
    }
}

/// Map an HTTP status and Discord JSON error code to a [`SendError`].
pub fn classify_status(status: u16, code: isize) -> SendError {
    match (status, code) {
        (_, CANNOT_MESSAGE_USER) | (403, _) | (404, _) => SendError::Forbidden,
        (_, ALREADY_ACKNOWLEDGED) => SendError::AlreadyResponded,
        _ => SendError::Transient(format!("http {} (code {})", status, code)),
    }
}

/// Everything that is not a Discord error response (network, decode,
/// ratelimiter) counts as transient.
pub fn classify(err: &serenity::Error) -> SendError {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
            classify_status(resp.status_code.as_u16(), resp.error.code)
        }
        other => SendError::Transient(other.to_string()),
    }
}

#[async_trait]
impl ChatClient for DiscordChatClient {
    async fn send_direct_message(
        &self,
        user_id: u64,
        payload: &NotificationPayload,
    ) -> Result<(), SendError> {
        // Discord ids are never zero; a zero here is a corrupt record.
        if user_id == 0 {
            return Err(SendError::Forbidden);
        }
        UserId::new(user_id)
            .direct_message(&*self.http, embed::to_message(payload))
            .await
            .map(|msg| debug!(user_id, message_id = %msg.id, "direct message sent"))
            .map_err(|e| classify(&e))
    }

    async fn send_interaction_response(
        &self,
        handle: &InteractionHandle,
        payload: &NotificationPayload,
    ) -> Result<(), SendError> {
        if handle.id == 0 {
            return Err(SendError::AlreadyResponded);
        }
        let response = CreateInteractionResponse::Message(embed::to_interaction_message(payload));
        self.http
            .create_interaction_response(
                InteractionId::new(handle.id),
                &handle.token,
                &response,
                Vec::new(),
            )
            .await
            .map_err(|e| classify(&e))
    }

    async fn send_follow_up(
        &self,
        handle: &InteractionHandle,
        payload: &NotificationPayload,
    ) -> Result<(), SendError> {
        self.http
            .create_followup_message(&handle.token, &embed::to_followup(payload), Vec::new())
            .await
            .map(|_| ())
            .map_err(|e| classify(&e))
    }
}

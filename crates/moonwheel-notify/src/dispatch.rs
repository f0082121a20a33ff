use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use moonwheel_core::config::DispatchConfig;

use crate::payload::NotificationPayload;

/// Reply path for a user interaction (slash command or button click).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionHandle {
    pub id: u64,
    pub token: String,
    /// Who clicked; used only for log fields.
    pub user_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Direct message to a user.
    Direct(u64),
    Interaction(InteractionHandle),
}

impl Destination {
    pub fn user_id(&self) -> u64 {
        match self {
            Destination::Direct(id) => *id,
            Destination::Interaction(h) => h.user_id,
        }
    }
}

/// How a single chat-client call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The user cannot be reached (DMs closed, bot blocked, account gone).
    #[error("recipient unreachable")]
    Forbidden,

    /// The interaction already has an initial response.
    #[error("interaction already acknowledged")]
    AlreadyResponded,

    /// Rate limit, network blip, upstream 5xx.
    #[error("transient failure: {0}")]
    Transient(String),
}

/// The external chat client, reduced to the three calls delivery needs.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_direct_message(
        &self,
        user_id: u64,
        payload: &NotificationPayload,
    ) -> Result<(), SendError>;

    async fn send_interaction_response(
        &self,
        handle: &InteractionHandle,
        payload: &NotificationPayload,
    ) -> Result<(), SendError>;

    async fn send_follow_up(
        &self,
        handle: &InteractionHandle,
        payload: &NotificationPayload,
    ) -> Result<(), SendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryResult {
    Ok,
    /// Not retried this tick.
    Unreachable,
    /// Still failing after every allowed attempt.
    TransientFailure,
}

/// Uniform "deliver this payload to this destination" over a [`ChatClient`].
///
/// Never blocks longer than `max_attempts × (timeout + backoff)` and never
/// returns an error: every failure is folded into a [`DeliveryResult`] and
/// logged here.
#[derive(Clone)]
pub struct DispatchGateway {
    client: Arc<dyn ChatClient>,
    max_attempts: u32,
    backoff: Duration,
    timeout: Duration,
}

impl DispatchGateway {
    pub fn new(
        client: Arc<dyn ChatClient>,
        max_attempts: u32,
        backoff: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            max_attempts: max_attempts.max(1),
            backoff,
            timeout,
        }
    }

    pub fn from_config(client: Arc<dyn ChatClient>, config: &DispatchConfig) -> Self {
        Self::new(
            client,
            config.max_attempts,
            Duration::from_millis(config.retry_backoff_ms),
            Duration::from_secs(config.send_timeout_secs),
        )
    }

    pub async fn deliver(
        &self,
        destination: &Destination,
        payload: &NotificationPayload,
    ) -> DeliveryResult {
        let user_id = destination.user_id();
        // Once the interaction is known to be acknowledged, stay on the
        // follow-up path for the remaining attempts.
        let mut use_follow_up = false;

        for attempt in 1..=self.max_attempts {
            let result = match destination {
                Destination::Direct(id) => {
                    self.bounded(self.client.send_direct_message(*id, payload))
                        .await
                }
                Destination::Interaction(handle) => {
                    if use_follow_up {
                        self.bounded(self.client.send_follow_up(handle, payload))
                            .await
                    } else {
                        match self
                            .bounded(self.client.send_interaction_response(handle, payload))
                            .await
                        {
                            Err(SendError::AlreadyResponded) => {
                                debug!(user_id, "interaction already acknowledged, using follow-up");
                                use_follow_up = true;
                                self.bounded(self.client.send_follow_up(handle, payload))
                                    .await
                            }
                            other => other,
                        }
                    }
                }
            };

            match result {
                Ok(()) => {
                    if attempt > 1 {
                        info!(user_id, attempt, "delivery succeeded after retry");
                    }
                    return DeliveryResult::Ok;
                }
                Err(SendError::Forbidden) => {
                    warn!(user_id, "recipient unreachable, not retrying");
                    return DeliveryResult::Unreachable;
                }
                Err(e) => {
                    warn!(user_id, attempt, error = %e, "delivery attempt failed");
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }

        warn!(user_id, attempts = self.max_attempts, "delivery gave up");
        DeliveryResult::TransientFailure
    }

    async fn bounded<F>(&self, call: F) -> Result<(), SendError>
    where
        F: std::future::Future<Output = Result<(), SendError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Transient(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted client: pops one result per call (Ok once the script runs out).
    #[derive(Default)]
    struct Scripted {
        direct: Mutex<VecDeque<Result<(), SendError>>>,
        response: Mutex<VecDeque<Result<(), SendError>>>,
        follow_up: Mutex<VecDeque<Result<(), SendError>>>,
        calls: Mutex<Vec<&'static str>>,
        hang: bool,
    }

    impl Scripted {
        fn next(queue: &Mutex<VecDeque<Result<(), SendError>>>) -> Result<(), SendError> {
            queue.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    #[async_trait]
    impl ChatClient for Scripted {
        async fn send_direct_message(
            &self,
            _user_id: u64,
            _payload: &NotificationPayload,
        ) -> Result<(), SendError> {
            self.calls.lock().unwrap().push("direct");
            if self.hang {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Self::next(&self.direct)
        }

        async fn send_interaction_response(
            &self,
            _handle: &InteractionHandle,
            _payload: &NotificationPayload,
        ) -> Result<(), SendError> {
            self.calls.lock().unwrap().push("response");
            Self::next(&self.response)
        }

        async fn send_follow_up(
            &self,
            _handle: &InteractionHandle,
            _payload: &NotificationPayload,
        ) -> Result<(), SendError> {
            self.calls.lock().unwrap().push("follow_up");
            Self::next(&self.follow_up)
        }
    }

    fn gateway(client: Arc<Scripted>) -> DispatchGateway {
        DispatchGateway::new(client, 3, Duration::from_millis(1), Duration::from_millis(50))
    }

    fn handle() -> Destination {
        Destination::Interaction(InteractionHandle {
            id: 1,
            token: "tok".into(),
            user_id: 9,
        })
    }

    fn payload() -> NotificationPayload {
        NotificationPayload::new("t", "b")
    }

    #[tokio::test]
    async fn forbidden_is_not_retried() {
        let client = Arc::new(Scripted::default());
        client.direct.lock().unwrap().push_back(Err(SendError::Forbidden));
        let result = gateway(client.clone()).deliver(&Destination::Direct(5), &payload()).await;
        assert_eq!(result, DeliveryResult::Unreachable);
        assert_eq!(client.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transient_is_retried_up_to_the_bound() {
        let client = Arc::new(Scripted::default());
        for _ in 0..5 {
            client
                .direct
                .lock()
                .unwrap()
                .push_back(Err(SendError::Transient("429".into())));
        }
        let result = gateway(client.clone()).deliver(&Destination::Direct(5), &payload()).await;
        assert_eq!(result, DeliveryResult::TransientFailure);
        assert_eq!(client.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn transient_then_success_is_ok() {
        let client = Arc::new(Scripted::default());
        client
            .direct
            .lock()
            .unwrap()
            .push_back(Err(SendError::Transient("503".into())));
        let result = gateway(client.clone()).deliver(&Destination::Direct(5), &payload()).await;
        assert_eq!(result, DeliveryResult::Ok);
        assert_eq!(client.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn already_responded_falls_back_to_follow_up() {
        let client = Arc::new(Scripted::default());
        client
            .response
            .lock()
            .unwrap()
            .push_back(Err(SendError::AlreadyResponded));
        let result = gateway(client.clone()).deliver(&handle(), &payload()).await;
        assert_eq!(result, DeliveryResult::Ok);
        assert_eq!(*client.calls.lock().unwrap(), vec!["response", "follow_up"]);
    }

    #[tokio::test]
    async fn retries_stay_on_follow_up_path() {
        let client = Arc::new(Scripted::default());
        client
            .response
            .lock()
            .unwrap()
            .push_back(Err(SendError::AlreadyResponded));
        client
            .follow_up
            .lock()
            .unwrap()
            .push_back(Err(SendError::Transient("reset".into())));
        let result = gateway(client.clone()).deliver(&handle(), &payload()).await;
        assert_eq!(result, DeliveryResult::Ok);
        assert_eq!(
            *client.calls.lock().unwrap(),
            vec!["response", "follow_up", "follow_up"]
        );
    }

    #[tokio::test]
    async fn hung_call_times_out_as_transient() {
        let client = Arc::new(Scripted {
            hang: true,
            ..Default::default()
        });
        let result = gateway(client.clone()).deliver(&Destination::Direct(5), &payload()).await;
        assert_eq!(result, DeliveryResult::TransientFailure);
        assert_eq!(client.calls.lock().unwrap().len(), 3);
    }
}

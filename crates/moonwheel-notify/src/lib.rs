//! `moonwheel-notify`: what to say and how to get it to the user.
//!
//! - [`compose`] turns a preference record plus calendar answers into a
//!   [`NotificationPayload`].
//! - [`action`] decodes follow-up buttons and recomputes their answers.
//! - [`dispatch`] wraps the chat client behind one retry/log contract.

pub mod action;
pub mod compose;
pub mod dispatch;
pub mod error;
pub mod payload;

pub use action::{resolve_action, FollowUpAction};
pub use compose::Composer;
pub use dispatch::{
    ChatClient, DeliveryResult, Destination, DispatchGateway, InteractionHandle, SendError,
};
pub use error::{NotifyError, Result};
pub use payload::{NotificationPayload, PayloadField};

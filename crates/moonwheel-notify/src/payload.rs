use serde::Serialize;

use crate::action::FollowUpAction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Platform-neutral message. The chat client decides how to render it
/// (embed, buttons, plain text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Accent colour (0xRRGGBB); `None` uses the client's default.
    pub color: Option<u32>,
    pub fields: Vec<PayloadField>,
    pub actions: Vec<FollowUpAction>,
    /// Only meaningful for interaction replies.
    pub ephemeral: bool,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            color: None,
            fields: Vec::new(),
            actions: Vec::new(),
            ephemeral: false,
        }
    }

    /// A short untitled notice, e.g. a command acknowledgement.
    pub fn notice(body: impl Into<String>) -> Self {
        Self::new(String::new(), body).ephemeral()
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(PayloadField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn actions(mut self, actions: Vec<FollowUpAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

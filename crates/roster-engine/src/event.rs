//! Transport-agnostic inbound events.

use serde::{Deserialize, Serialize};

use crate::messenger::MessageRef;
use crate::IdentityId;

/// A chat participant as seen by the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatIdentity {
    pub id: IdentityId,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub display_name: String,
}

impl ChatIdentity {
    /// `@handle`, or a placeholder when the account has none.
    pub fn handle_label(&self) -> String {
        match self.handle.as_deref().map(str::trim) {
            Some(handle) if !handle.is_empty() => format!("@{handle}"),
            _ => "no handle".to_string(),
        }
    }

    /// Value stored in the handle column: `@handle` or empty.
    pub fn handle_cell(&self) -> String {
        match self.handle.as_deref().map(str::trim) {
            Some(handle) if !handle.is_empty() => format!("@{handle}"),
            _ => String::new(),
        }
    }
}

/// Where a forwarded message originally came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForwardOrigin {
    User { identity: ChatIdentity },
    HiddenUser { sender_name: String },
    Channel { title: String },
    Chat { title: String },
}

impl ForwardOrigin {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::HiddenUser { .. } => "hidden_user",
            Self::Channel { .. } => "channel",
            Self::Chat { .. } => "chat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub sender: ChatIdentity,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub forward_origin: Option<ForwardOrigin>,
}

impl InboundMessage {
    /// Text or caption, trimmed; empty when the message has neither.
    pub fn body(&self) -> &str {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .map(str::trim)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonPress {
    pub press_id: String,
    pub sender: ChatIdentity,
    /// Message carrying the pressed button; absent when the platform no longer exposes it.
    #[serde(default)]
    pub message: Option<MessageRef>,
    #[serde(default)]
    pub message_text: String,
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Message(InboundMessage),
    ButtonPress(ButtonPress),
}

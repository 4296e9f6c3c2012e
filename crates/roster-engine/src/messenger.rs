//! Outbound messaging capability consumed by the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MessengerError;

/// Labeled action button; `payload` travels back in the button press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Rows of buttons, rendered top to bottom.
pub type Keyboard = Vec<Vec<Button>>;

/// Address of a message previously sent by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError>;

    /// Replaces text and buttons of an earlier message; `None` strips the buttons.
    async fn edit_message(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError>;

    /// Acknowledges a button press, optionally with a short notice.
    async fn acknowledge(&self, press_id: &str, notice: Option<&str>) -> Result<(), MessengerError>;
}

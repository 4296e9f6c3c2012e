//! Maps Bot API updates onto the engine's transport-agnostic events.

use roster_engine::{ButtonPress, ForwardOrigin, InboundEvent, InboundMessage, MessageRef};

use crate::telegram_types::{
    TelegramCallbackQuery, TelegramChat, TelegramMessage, TelegramMessageOrigin, TelegramUpdate,
};

/// Returns `None` for update kinds the bot does not handle (channel posts,
/// edits, messages without a sender).
pub fn inbound_event_from_update(update: &TelegramUpdate) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query.as_ref() {
        return Some(InboundEvent::ButtonPress(button_press(query)));
    }
    let message = update.message.as_ref()?;
    let sender = message.from.as_ref()?;
    Some(InboundEvent::Message(InboundMessage {
        chat_id: message.chat.id,
        message_id: message.message_id,
        sender: sender.identity(),
        text: message.text.clone(),
        caption: message.caption.clone(),
        forward_origin: forward_origin(message),
    }))
}

fn button_press(query: &TelegramCallbackQuery) -> ButtonPress {
    let message = query.message.as_ref();
    ButtonPress {
        press_id: query.id.clone(),
        sender: query.from.identity(),
        message: message.map(|message| MessageRef {
            chat_id: message.chat.id,
            message_id: message.message_id,
        }),
        message_text: message
            .and_then(|message| message.text.as_deref().or(message.caption.as_deref()))
            .unwrap_or_default()
            .to_string(),
        payload: query.data.clone().unwrap_or_default(),
    }
}

fn chat_origin(chat: &TelegramChat) -> ForwardOrigin {
    let title = chat.title.clone().unwrap_or_default();
    if chat.kind == "channel" {
        ForwardOrigin::Channel { title }
    } else {
        ForwardOrigin::Chat { title }
    }
}

fn forward_origin(message: &TelegramMessage) -> Option<ForwardOrigin> {
    if let Some(origin) = message.forward_origin.as_ref() {
        return Some(match origin {
            TelegramMessageOrigin::User { sender_user } => ForwardOrigin::User {
                identity: sender_user.identity(),
            },
            TelegramMessageOrigin::HiddenUser { sender_user_name } => ForwardOrigin::HiddenUser {
                sender_name: sender_user_name.clone(),
            },
            TelegramMessageOrigin::Chat { sender_chat } => ForwardOrigin::Chat {
                title: sender_chat.title.clone().unwrap_or_default(),
            },
            TelegramMessageOrigin::Channel { chat } => ForwardOrigin::Channel {
                title: chat.title.clone().unwrap_or_default(),
            },
            // Still a forward; without an account it cannot be bound.
            TelegramMessageOrigin::Unknown => ForwardOrigin::HiddenUser {
                sender_name: String::new(),
            },
        });
    }
    if let Some(user) = message.forward_from.as_ref() {
        return Some(ForwardOrigin::User {
            identity: user.identity(),
        });
    }
    if let Some(name) = message.forward_sender_name.as_ref() {
        return Some(ForwardOrigin::HiddenUser {
            sender_name: name.clone(),
        });
    }
    message.forward_from_chat.as_ref().map(chat_origin)
}

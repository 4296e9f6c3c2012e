//! Telegram Bot API transport for the roster engine: update decoding, the
//! outbound client, the webhook server, and the long-polling runner.

pub mod telegram_api_client;
pub mod telegram_polling;
pub mod telegram_types;
pub mod telegram_update;
pub mod telegram_webhook;

pub use telegram_api_client::{TelegramApiClient, TelegramClientConfig};
pub use telegram_polling::{
    run_telegram_polling, TelegramPollingConfig, TelegramPollingState, TelegramPollSummary,
};
pub use telegram_types::{
    TelegramCallbackQuery, TelegramChat, TelegramMessage, TelegramMessageOrigin, TelegramUpdate,
    TelegramUser,
};
pub use telegram_update::inbound_event_from_update;
pub use telegram_webhook::{
    build_webhook_router, run_telegram_webhook_server, TelegramWebhookConfig,
    TELEGRAM_SECRET_HEADER,
};

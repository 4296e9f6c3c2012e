//! Bot API client used for replies, button acknowledgements, and polling.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use roster_core::{
    is_retryable_status, parse_retry_after, retry_delay, truncate_for_error,
    RETRY_ATTEMPT_HEADER,
};
use roster_engine::{Keyboard, MessageRef, Messenger, MessengerError};

use crate::telegram_types::{
    InlineKeyboardMarkup, TelegramApiResponse, TelegramMessage, TelegramUpdate,
};

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const MESSAGE_NOT_MODIFIED: &str = "message is not modified";

#[derive(Debug, Clone)]
pub struct TelegramClientConfig {
    pub api_base: String,
    pub bot_token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for TelegramClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
            bot_token: String::new(),
            request_timeout_ms: 10_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 250,
        }
    }
}

#[derive(Clone)]
pub struct TelegramApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    request_timeout_ms: u64,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl std::fmt::Debug for TelegramApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramApiClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

fn reply_markup(keyboard: Option<&Keyboard>) -> Option<Value> {
    keyboard.map(|keyboard| json!(InlineKeyboardMarkup::from(keyboard)))
}

/// Methods whose repetition would produce a visible duplicate.
const NON_IDEMPOTENT_METHODS: &[&str] = &["sendMessage"];

/// A non-idempotent call may already have reached Telegram unless the
/// connection itself failed.
fn is_retryable_transport_error(method: &str, error: &reqwest::Error) -> bool {
    if NON_IDEMPOTENT_METHODS.contains(&method) {
        return error.is_connect();
    }
    error.is_timeout() || error.is_connect() || error.is_request()
}

impl TelegramApiClient {
    pub fn new(config: TelegramClientConfig) -> Result<Self> {
        let bot_token = config.bot_token.trim().to_string();
        if bot_token.is_empty() {
            bail!("telegram bot token cannot be empty");
        }
        let api_base = config.api_base.trim().trim_end_matches('/').to_string();
        if api_base.is_empty() {
            bail!("telegram api base cannot be empty");
        }
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("roster-telegram"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to create telegram api client")?;
        Ok(Self {
            http,
            api_base,
            bot_token,
            request_timeout_ms: config.request_timeout_ms.max(1),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    /// Long-polls for updates starting at `offset`. The request timeout is
    /// stretched by the server-side wait.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<TelegramUpdate>, MessengerError> {
        let mut payload = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        let timeout = Duration::from_millis(self.request_timeout_ms)
            .saturating_add(Duration::from_secs(timeout_secs));
        self.call("getUpdates", &payload, timeout).await
    }

    /// Swaps only the inline keyboard of an earlier message.
    pub async fn edit_reply_markup(
        &self,
        message: MessageRef,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError> {
        let mut payload = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
        });
        if let Some(markup) = reply_markup(keyboard) {
            payload["reply_markup"] = markup;
        }
        let result = self
            .call::<Value>("editMessageReplyMarkup", &payload, self.default_timeout())
            .await;
        ignore_not_modified(result)
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    async fn call<T>(
        &self,
        method: &'static str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<T, MessengerError>
    where
        T: DeserializeOwned,
    {
        let url = self.method_url(method);
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = self
                .http
                .post(url.as_str())
                .timeout(timeout)
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .json(payload)
                .send()
                .await;
            let response = match response {
                Ok(response) => response,
                Err(error) => {
                    if attempt < self.retry_max_attempts
                        && is_retryable_transport_error(method, &error)
                    {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(MessengerError::Request(format!(
                        "telegram {method} request failed: {error}"
                    )));
                }
            };

            let status = response.status();
            let header_retry_after = parse_retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok()),
            );
            let body = response.text().await.unwrap_or_default();
            let envelope = serde_json::from_str::<TelegramApiResponse<T>>(&body);

            if status.is_success() {
                let envelope = envelope.map_err(|error| {
                    MessengerError::Request(format!("failed to decode telegram {method}: {error}"))
                })?;
                if envelope.ok {
                    return envelope.result.ok_or_else(|| {
                        MessengerError::Request(format!("telegram {method} returned no result"))
                    });
                }
                return Err(MessengerError::Rejected {
                    operation: method,
                    description: envelope
                        .description
                        .unwrap_or_else(|| "unknown error".to_string()),
                });
            }

            let (description, body_retry_after) = match envelope {
                Ok(envelope) => (
                    envelope.description.unwrap_or_default(),
                    envelope.parameters.and_then(|parameters| parameters.retry_after),
                ),
                Err(_) => (truncate_for_error(&body, 800), None),
            };
            if attempt < self.retry_max_attempts && is_retryable_status(status.as_u16()) {
                debug!(method, attempt, status = status.as_u16(), "retrying telegram request");
                tokio::time::sleep(retry_delay(
                    self.retry_base_delay_ms,
                    attempt,
                    body_retry_after.or(header_retry_after),
                ))
                .await;
                continue;
            }
            return Err(MessengerError::Rejected {
                operation: method,
                description: format!("status {}: {description}", status.as_u16()),
            });
        }
    }
}

/// Telegram refuses edits that change nothing; the message already shows
/// what was asked for.
fn ignore_not_modified<T>(result: Result<T, MessengerError>) -> Result<(), MessengerError> {
    match result {
        Ok(_) => Ok(()),
        Err(MessengerError::Rejected { description, .. })
            if description.contains(MESSAGE_NOT_MODIFIED) =>
        {
            debug!("telegram edit skipped: message unchanged");
            Ok(())
        }
        Err(error) => Err(error),
    }
}

#[async_trait]
impl Messenger for TelegramApiClient {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError> {
        let mut payload = json!({"chat_id": chat_id, "text": text});
        if let Some(markup) = reply_markup(keyboard) {
            payload["reply_markup"] = markup;
        }
        let sent: TelegramMessage = self
            .call("sendMessage", &payload, self.default_timeout())
            .await?;
        Ok(MessageRef {
            chat_id: sent.chat.id,
            message_id: sent.message_id,
        })
    }

    async fn edit_message(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError> {
        // Empty text is rejected by editMessageText; only the buttons can change.
        if text.trim().is_empty() {
            return self.edit_reply_markup(message, keyboard).await;
        }
        let mut payload = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
            "text": text,
        });
        if let Some(markup) = reply_markup(keyboard) {
            payload["reply_markup"] = markup;
        }
        let result = self
            .call::<Value>("editMessageText", &payload, self.default_timeout())
            .await;
        ignore_not_modified(result)
    }

    async fn acknowledge(&self, press_id: &str, notice: Option<&str>) -> Result<(), MessengerError> {
        let mut payload = json!({"callback_query_id": press_id});
        if let Some(notice) = notice {
            payload["text"] = Value::String(notice.to_string());
        }
        let acknowledged: bool = self
            .call("answerCallbackQuery", &payload, self.default_timeout())
            .await?;
        if !acknowledged {
            warn!(press_id, "telegram answerCallbackQuery returned false");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use roster_engine::Button;

    fn test_client(base_url: &str) -> TelegramApiClient {
        TelegramApiClient::new(TelegramClientConfig {
            api_base: base_url.to_string(),
            bot_token: "bot-token".to_string(),
            request_timeout_ms: 2_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 1,
        })
        .expect("client")
    }

    fn sent_message(chat_id: i64, message_id: i64) -> Value {
        json!({
            "ok": true,
            "result": {
                "message_id": message_id,
                "chat": {"id": chat_id, "type": "private"},
                "text": "ok"
            }
        })
    }

    #[test]
    fn unit_new_rejects_blank_token() {
        let error = TelegramApiClient::new(TelegramClientConfig::default()).expect_err("token");
        assert!(error.to_string().contains("bot token cannot be empty"));
    }

    #[tokio::test]
    async fn functional_send_text_with_keyboard_posts_inline_markup() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botbot-token/sendMessage")
                .json_body(json!({
                    "chat_id": 700,
                    "text": "Row 2 | saved @ivan",
                    "reply_markup": {"inline_keyboard": [[{"text": "1 • Registered", "callback_data": "s1_2"}]]}
                }));
            then.status(200).json_body(sent_message(700, 41));
        });
        let keyboard = vec![vec![Button::new("1 • Registered", "s1_2")]];
        let sent = test_client(&server.base_url())
            .send_text(700, "Row 2 | saved @ivan", Some(&keyboard))
            .await
            .expect("send");
        mock.assert();
        assert_eq!(
            sent,
            MessageRef {
                chat_id: 700,
                message_id: 41
            }
        );
    }

    #[tokio::test]
    async fn functional_edit_without_keyboard_omits_reply_markup() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/botbot-token/editMessageText").json_body(json!({
                "chat_id": 700,
                "message_id": 41,
                "text": "Row 2 | @ivan\n\n→ paid ✓"
            }));
            then.status(200).json_body(sent_message(700, 41));
        });
        test_client(&server.base_url())
            .edit_message(
                MessageRef {
                    chat_id: 700,
                    message_id: 41,
                },
                "Row 2 | @ivan\n\n→ paid ✓",
                None,
            )
            .await
            .expect("edit");
        mock.assert();
    }

    #[tokio::test]
    async fn functional_edit_with_empty_text_swaps_only_markup() {
        let server = MockServer::start();
        let markup = server.mock(|when, then| {
            when.method(POST)
                .path("/botbot-token/editMessageReplyMarkup")
                .body_includes("\"inline_keyboard\"");
            then.status(200).json_body(sent_message(700, 41));
        });
        let keyboard = vec![vec![Button::new("Batch 1 · 0/15", "b1_2")]];
        test_client(&server.base_url())
            .edit_message(
                MessageRef {
                    chat_id: 700,
                    message_id: 41,
                },
                "",
                Some(&keyboard),
            )
            .await
            .expect("edit markup");
        markup.assert();
    }

    #[tokio::test]
    async fn regression_unchanged_edit_is_not_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/botbot-token/editMessageText");
            then.status(400).json_body(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
            }));
        });
        let result = test_client(&server.base_url())
            .edit_message(
                MessageRef {
                    chat_id: 1,
                    message_id: 2,
                },
                "same",
                None,
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn functional_acknowledge_sends_optional_notice() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botbot-token/answerCallbackQuery")
                .json_body(json!({"callback_query_id": "cb-1", "text": "Unknown action."}));
            then.status(200).json_body(json!({"ok": true, "result": true}));
        });
        test_client(&server.base_url())
            .acknowledge("cb-1", Some("Unknown action."))
            .await
            .expect("ack");
        mock.assert();
    }

    #[tokio::test]
    async fn integration_rate_limited_call_honors_retry_after_and_succeeds() {
        let server = MockServer::start();
        let limited = server.mock(|when, then| {
            when.method(POST)
                .path("/botbot-token/sendMessage")
                .header(RETRY_ATTEMPT_HEADER, "0");
            then.status(429).json_body(json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 0",
                "parameters": {"retry_after": 0}
            }));
        });
        let accepted = server.mock(|when, then| {
            when.method(POST)
                .path("/botbot-token/sendMessage")
                .header(RETRY_ATTEMPT_HEADER, "1");
            then.status(200).json_body(sent_message(5, 6));
        });
        let sent = test_client(&server.base_url())
            .send_text(5, "hello", None)
            .await
            .expect("send after retry");
        assert_eq!(sent.message_id, 6);
        assert_eq!(limited.calls(), 1);
        assert_eq!(accepted.calls(), 1);
    }

    #[tokio::test]
    async fn regression_forbidden_send_reports_rejection_without_retry() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/botbot-token/sendMessage");
            then.status(403).json_body(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            }));
        });
        let error = test_client(&server.base_url())
            .send_text(5, "hello", None)
            .await
            .expect_err("blocked");
        mock.assert_calls(1);
        match error {
            MessengerError::Rejected {
                operation,
                description,
            } => {
                assert_eq!(operation, "sendMessage");
                assert!(description.contains("blocked by the user"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn regression_timed_out_send_is_not_repeated() {
        let server = MockServer::start();
        let slow = server.mock(|when, then| {
            when.method(POST).path("/botbot-token/sendMessage");
            then.status(200)
                .delay(Duration::from_millis(800))
                .json_body(sent_message(5, 6));
        });
        let client = TelegramApiClient::new(TelegramClientConfig {
            api_base: server.base_url(),
            bot_token: "bot-token".to_string(),
            request_timeout_ms: 100,
            retry_max_attempts: 3,
            retry_base_delay_ms: 1,
        })
        .expect("client");
        let error = client
            .send_text(5, "hello", None)
            .await
            .expect_err("timed out");
        assert!(matches!(error, MessengerError::Request(_)));
        slow.assert_calls(1);
    }

    #[tokio::test]
    async fn functional_timed_out_edit_is_retried() {
        let server = MockServer::start();
        let slow = server.mock(|when, then| {
            when.method(POST)
                .path("/botbot-token/editMessageText")
                .header(RETRY_ATTEMPT_HEADER, "0");
            then.status(200)
                .delay(Duration::from_millis(800))
                .json_body(sent_message(5, 6));
        });
        let fast = server.mock(|when, then| {
            when.method(POST)
                .path("/botbot-token/editMessageText")
                .header(RETRY_ATTEMPT_HEADER, "1");
            then.status(200).json_body(sent_message(5, 6));
        });
        let client = TelegramApiClient::new(TelegramClientConfig {
            api_base: server.base_url(),
            bot_token: "bot-token".to_string(),
            request_timeout_ms: 100,
            retry_max_attempts: 3,
            retry_base_delay_ms: 1,
        })
        .expect("client");
        client
            .edit_message(
                MessageRef {
                    chat_id: 5,
                    message_id: 6,
                },
                "edited",
                None,
            )
            .await
            .expect("edit after retry");
        slow.assert_calls(1);
        fast.assert_calls(1);
    }

    #[tokio::test]
    async fn functional_get_updates_sends_offset_and_decodes_result() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botbot-token/getUpdates")
                .body_includes("\"offset\":101");
            then.status(200).json_body(json!({
                "ok": true,
                "result": [{
                    "update_id": 101,
                    "message": {
                        "message_id": 1,
                        "chat": {"id": 9, "type": "private"},
                        "from": {"id": 9, "first_name": "Oleg"},
                        "text": "/start"
                    }
                }]
            }));
        });
        let updates = test_client(&server.base_url())
            .get_updates(Some(101), 0)
            .await
            .expect("updates");
        mock.assert();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 101);
    }
}

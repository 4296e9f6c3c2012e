//! Long-polling ingress with a persisted update offset.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use roster_core::{current_unix_timestamp_ms, load_json_or_default, write_json_atomic};
use roster_engine::Engine;

use crate::telegram_api_client::TelegramApiClient;
use crate::telegram_update::inbound_event_from_update;

const POLLING_STATE_SCHEMA_VERSION: u32 = 1;

fn polling_state_schema_version() -> u32 {
    POLLING_STATE_SCHEMA_VERSION
}

#[derive(Debug, Clone)]
pub struct TelegramPollingConfig {
    pub state_path: PathBuf,
    /// Server-side long-poll wait per `getUpdates` call.
    pub poll_timeout_secs: u64,
    /// Pause after a failed poll before trying again.
    pub failure_backoff_ms: u64,
    /// Run a single poll cycle and return.
    pub poll_once: bool,
}

impl Default for TelegramPollingConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(".roster/telegram-polling.json"),
            poll_timeout_secs: 30,
            failure_backoff_ms: 1_000,
            poll_once: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramPollingState {
    #[serde(default = "polling_state_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub next_update_offset: Option<i64>,
    #[serde(default)]
    pub processed_updates: u64,
    #[serde(default)]
    pub updated_unix_ms: u64,
}

impl Default for TelegramPollingState {
    fn default() -> Self {
        Self {
            schema_version: POLLING_STATE_SCHEMA_VERSION,
            next_update_offset: None,
            processed_updates: 0,
            updated_unix_ms: 0,
        }
    }
}

impl TelegramPollingState {
    pub fn load(path: &Path) -> Result<Self> {
        load_json_or_default(path)
            .with_context(|| format!("failed to load polling state {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
            .with_context(|| format!("failed to save polling state {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelegramPollSummary {
    pub cycles: u64,
    pub updates_received: u64,
    pub dispatched: u64,
    pub ignored: u64,
    pub poll_failures: u64,
    pub state_save_failures: u64,
}

/// Polls until ctrl-c (or once with `poll_once`), dispatching updates in
/// `update_id` order. The offset is saved after every non-empty batch, so a
/// restart never replays an update that was already dispatched. Only an
/// unreadable state file at startup is fatal.
pub async fn run_telegram_polling(
    engine: Arc<Engine>,
    client: &TelegramApiClient,
    config: &TelegramPollingConfig,
) -> Result<TelegramPollSummary> {
    let mut state = TelegramPollingState::load(&config.state_path)?;
    let mut summary = TelegramPollSummary::default();
    info!(
        state_path = %config.state_path.display(),
        offset = ?state.next_update_offset,
        "telegram polling started"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        let timeout_secs = if config.poll_once { 0 } else { config.poll_timeout_secs };
        let fetched = tokio::select! {
            _ = &mut shutdown => {
                info!("telegram polling interrupted");
                break;
            }
            fetched = client.get_updates(state.next_update_offset, timeout_secs) => fetched,
        };
        summary.cycles = summary.cycles.saturating_add(1);

        match fetched {
            Ok(mut updates) => {
                updates.sort_by_key(|update| update.update_id);
                for update in &updates {
                    summary.updates_received = summary.updates_received.saturating_add(1);
                    match inbound_event_from_update(update) {
                        Some(event) => {
                            let outcome = engine.dispatch(event).await;
                            debug!(
                                update_id = update.update_id,
                                outcome = outcome.as_str(),
                                "telegram update dispatched"
                            );
                            summary.dispatched = summary.dispatched.saturating_add(1);
                        }
                        None => {
                            summary.ignored = summary.ignored.saturating_add(1);
                        }
                    }
                    state.next_update_offset = Some(update.update_id.saturating_add(1));
                    state.processed_updates = state.processed_updates.saturating_add(1);
                }
                if !updates.is_empty() {
                    state.updated_unix_ms = current_unix_timestamp_ms();
                    // The in-memory offset stays correct; the next batch retries the save.
                    if let Err(error) = state.save(&config.state_path) {
                        summary.state_save_failures = summary.state_save_failures.saturating_add(1);
                        warn!(error = %format!("{error:#}"), "telegram polling state not saved");
                    }
                }
            }
            Err(error) => {
                summary.poll_failures = summary.poll_failures.saturating_add(1);
                warn!(%error, "telegram getUpdates failed");
                if !config.poll_once {
                    tokio::time::sleep(Duration::from_millis(config.failure_backoff_ms.max(1)))
                        .await;
                }
            }
        }

        if config.poll_once {
            break;
        }
    }

    info!(
        cycles = summary.cycles,
        updates = summary.updates_received,
        dispatched = summary.dispatched,
        ignored = summary.ignored,
        poll_failures = summary.poll_failures,
        state_save_failures = summary.state_save_failures,
        "telegram polling stopped"
    );
    Ok(summary)
}

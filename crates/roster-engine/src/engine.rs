//! Event dispatch: identity binding, stage transitions, and stats replies.
//!
//! Every inbound event ends in a [`DispatchOutcome`]. Failures are turned into
//! user-facing replies here and never escape to the transport loop.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::binding::BindingCache;
use crate::error::EngineError;
use crate::event::{ButtonPress, ChatIdentity, ForwardOrigin, InboundEvent, InboundMessage};
use crate::layout::{BatchPolicy, ColumnLayout, LayoutError, MarkerPalette};
use crate::messenger::{Keyboard, Messenger};
use crate::resolver::NameQuery;
use crate::stage::{batch_keyboard, stage_keyboard, ControlPayload, Stage};
use crate::stats::{batch_fill_counts, compute_stats};
use crate::store::RecordStore;
use crate::{IdentityId, RowIndex};

pub const START_PROMPT: &str = "Send your full name (first and last name).";
pub const RETRY_AMBIGUOUS: &str =
    "Need at least two words of the full name.\nTry the full name again.";
pub const RETRY_NO_MATCH: &str =
    "Not found.\nTry the full name again or forward a message from the participant.";
pub const UNRESOLVABLE_FORWARD: &str = "This forward hides the sender's account, so it can't be \
     linked.\nAsk the participant to write directly, or send their full name.";
pub const STORE_UNAVAILABLE: &str = "The roster is unavailable right now. Try again shortly.";
pub const STAGE_WRITE_FAILED: &str = "Could not save the stage. Try again.";
pub const UNKNOWN_ACTION: &str = "Unknown action.";

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub layout: ColumnLayout,
    pub batches: BatchPolicy,
    pub palette: MarkerPalette,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        self.layout.validate()?;
        self.batches.validate()
    }
}

/// What the engine did with one inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Prompted,
    StatsReported,
    Bound {
        identity: IdentityId,
        row: RowIndex,
    },
    AlreadyBound {
        identity: IdentityId,
        row: RowIndex,
    },
    Unresolved {
        reason: &'static str,
    },
    BatchMenuShown {
        row: RowIndex,
    },
    StageCommitted {
        row: RowIndex,
        stage: Stage,
        batch: Option<u8>,
    },
    Rejected {
        reason: &'static str,
    },
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompted => "prompted",
            Self::StatsReported => "stats_reported",
            Self::Bound { .. } => "bound",
            Self::AlreadyBound { .. } => "already_bound",
            Self::Unresolved { .. } => "unresolved",
            Self::BatchMenuShown { .. } => "batch_menu_shown",
            Self::StageCommitted { .. } => "stage_committed",
            Self::Rejected { .. } => "rejected",
        }
    }
}

enum Command {
    Start,
    Stats,
}

fn parse_command(body: &str) -> Option<Command> {
    let first = body.split_whitespace().next()?;
    // Group chats address commands as `/start@botname`.
    let name = first.split('@').next().unwrap_or(first);
    match name {
        "/start" => Some(Command::Start),
        "/stats" => Some(Command::Stats),
        _ => None,
    }
}

pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn RecordStore>,
    messenger: Arc<dyn Messenger>,
    bindings: BindingCache,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn RecordStore>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            config,
            store,
            messenger,
            bindings: BindingCache::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bindings(&self) -> &BindingCache {
        &self.bindings
    }

    /// Handles one inbound event to completion.
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        match event {
            InboundEvent::Message(message) => self.handle_message(message).await,
            InboundEvent::ButtonPress(press) => self.handle_button_press(press).await,
        }
    }

    async fn handle_message(&self, message: InboundMessage) -> DispatchOutcome {
        let body = message.body().to_string();
        let subject = match &message.forward_origin {
            None => {
                match parse_command(&body) {
                    Some(Command::Start) => {
                        self.reply(message.chat_id, START_PROMPT, None).await;
                        return DispatchOutcome::Prompted;
                    }
                    Some(Command::Stats) => return self.report_stats(message.chat_id).await,
                    None => {}
                }
                message.sender.clone()
            }
            Some(ForwardOrigin::User { identity }) => identity.clone(),
            Some(origin) => {
                let error = EngineError::UnresolvableIdentity {
                    origin: origin.kind(),
                };
                info!(chat_id = message.chat_id, %error, "forward origin cannot be bound");
                self.reply(message.chat_id, UNRESOLVABLE_FORWARD, None).await;
                return DispatchOutcome::Unresolved {
                    reason: error.code(),
                };
            }
        };

        let name = if body.is_empty() && message.forward_origin.is_some() {
            subject.display_name.clone()
        } else {
            body
        };

        match self.resolve_identity(&subject, &name).await {
            Ok((row, fresh)) => {
                let text = if fresh {
                    format!("Row {row} | saved {}", subject.handle_label())
                } else {
                    format!("Row {row} | {}", subject.handle_label())
                };
                self.reply(message.chat_id, &text, Some(&stage_keyboard(row)))
                    .await;
                if fresh {
                    DispatchOutcome::Bound {
                        identity: subject.id,
                        row,
                    }
                } else {
                    DispatchOutcome::AlreadyBound {
                        identity: subject.id,
                        row,
                    }
                }
            }
            Err(error) => {
                let reply = match &error {
                    EngineError::AmbiguousOrEmptyInput => RETRY_AMBIGUOUS,
                    EngineError::StoreUnavailable(_) => STORE_UNAVAILABLE,
                    _ => RETRY_NO_MATCH,
                };
                info!(identity = subject.id, %error, "identity not resolved");
                self.reply(message.chat_id, reply, None).await;
                DispatchOutcome::Unresolved {
                    reason: error.code(),
                }
            }
        }
    }

    /// Returns the bound row and whether this call created the binding.
    async fn resolve_identity(
        &self,
        identity: &ChatIdentity,
        name: &str,
    ) -> Result<(RowIndex, bool), EngineError> {
        let mut claim = self.bindings.claim(identity.id).await;
        if let Some(row) = claim.row() {
            return Ok((row, false));
        }

        let query = NameQuery::parse(name)?;
        let snapshot = self
            .store
            .snapshot()
            .await
            .map_err(EngineError::StoreUnavailable)?;
        let row = query
            .find_row(&snapshot, &self.config.layout)
            .ok_or(EngineError::NoMatch)?;

        claim.record(row);
        info!(identity = identity.id, row, "identity bound to roster row");
        self.write_through(identity, row).await;
        Ok((row, true))
    }

    /// Mirrors a new binding into the identity and handle columns. Failures are
    /// logged; the in-memory binding stays authoritative for this process.
    async fn write_through(&self, identity: &ChatIdentity, row: RowIndex) {
        let layout = &self.config.layout;
        let owner = identity.id.to_string();
        match self.store.get_cell(row, layout.identity_id).await {
            Ok(previous) if !previous.trim().is_empty() && previous.trim() != owner => {
                warn!(
                    row,
                    previous = previous.trim(),
                    identity = identity.id,
                    "row already claimed by another identity; overwriting"
                );
            }
            Ok(_) => {}
            Err(error) => debug!(row, %error, "could not read previous row owner"),
        }

        let writes = [
            (layout.identity_id, owner),
            (layout.handle, identity.handle_cell()),
        ];
        for (column, value) in writes {
            if let Err(error) = self.store.set_cell(row, column, &value).await {
                let error = EngineError::StoreWriteFailure(error);
                warn!(row, column, %error, "binding write-through failed");
            }
        }
    }

    async fn report_stats(&self, chat_id: i64) -> DispatchOutcome {
        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                let error = EngineError::StoreUnavailable(error);
                warn!(%error, "stats snapshot failed");
                self.reply(chat_id, STORE_UNAVAILABLE, None).await;
                return DispatchOutcome::Unresolved {
                    reason: error.code(),
                };
            }
        };
        let stats = compute_stats(&snapshot, &self.config.layout, &self.config.batches);
        self.reply(chat_id, &stats.render(&self.config.batches), None)
            .await;
        DispatchOutcome::StatsReported
    }

    async fn handle_button_press(&self, press: ButtonPress) -> DispatchOutcome {
        let parsed = ControlPayload::parse(&press.payload, &self.config.batches);
        let (outcome, notice) = match parsed {
            Err(error) => {
                warn!(press_id = %press.press_id, %error, "rejected button press");
                (
                    DispatchOutcome::Rejected {
                        reason: error.code(),
                    },
                    Some(UNKNOWN_ACTION),
                )
            }
            Ok(ControlPayload::Stage {
                stage: Stage::CredentialsIssued,
                row,
            }) => self.open_batch_menu(&press, row).await,
            Ok(ControlPayload::Stage { stage, row }) => {
                self.commit_stage(&press, row, stage, None).await
            }
            Ok(ControlPayload::Batch { batch, row }) => {
                self.commit_stage(&press, row, Stage::CredentialsIssued, Some(batch))
                    .await
            }
        };
        if let Err(error) = self.messenger.acknowledge(&press.press_id, notice).await {
            warn!(press_id = %press.press_id, %error, "button acknowledge failed");
        }
        outcome
    }

    async fn open_batch_menu(
        &self,
        press: &ButtonPress,
        row: RowIndex,
    ) -> (DispatchOutcome, Option<&'static str>) {
        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                let error = EngineError::StoreUnavailable(error);
                warn!(row, %error, "batch menu snapshot failed");
                return (
                    DispatchOutcome::Unresolved {
                        reason: error.code(),
                    },
                    Some(STORE_UNAVAILABLE),
                );
            }
        };
        let fill = batch_fill_counts(&snapshot, &self.config.layout, &self.config.batches);
        let keyboard = batch_keyboard(row, &self.config.batches, &fill);
        self.show(press, &press.message_text, Some(&keyboard)).await;
        (DispatchOutcome::BatchMenuShown { row }, None)
    }

    async fn commit_stage(
        &self,
        press: &ButtonPress,
        row: RowIndex,
        stage: Stage,
        batch: Option<u8>,
    ) -> (DispatchOutcome, Option<&'static str>) {
        let layout = &self.config.layout;
        if let Err(error) = self.store.set_cell(row, layout.stage, stage.label()).await {
            let error = EngineError::StoreWriteFailure(error);
            error!(row, stage = stage.label(), %error, "stage write failed");
            return (
                DispatchOutcome::Rejected {
                    reason: error.code(),
                },
                Some(STAGE_WRITE_FAILED),
            );
        }

        if let Some(batch) = batch {
            if let Err(error) = self
                .store
                .set_cell(row, layout.batch, &batch.to_string())
                .await
            {
                let error = EngineError::StoreWriteFailure(error);
                warn!(row, batch, %error, "batch write failed after stage write");
            }
        }

        let marker = self.config.palette.marker_for(stage);
        if let Err(error) = self.store.set_row_marker(row, marker).await {
            warn!(row, marker = %marker.to_hex(), %error, "row marker update failed");
        }

        info!(row, stage = stage.label(), ?batch, "stage committed");
        let text = format!("{}\n\n{}", press.message_text, stage.confirmation(batch));
        self.show(press, text.trim_start(), None).await;
        (DispatchOutcome::StageCommitted { row, stage, batch }, None)
    }

    /// Edits the pressed message in place; skipped when the platform no longer
    /// exposes it. Failures are logged only.
    async fn show(&self, press: &ButtonPress, text: &str, keyboard: Option<&Keyboard>) {
        let Some(message) = press.message else {
            debug!(press_id = %press.press_id, "pressed message not addressable; skipping edit");
            return;
        };
        if let Err(error) = self.messenger.edit_message(message, text, keyboard).await {
            warn!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                %error,
                "message edit failed"
            );
        }
    }

    async fn reply(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) {
        if let Err(error) = self.messenger.send_text(chat_id, text, keyboard).await {
            warn!(chat_id, %error, "reply delivery failed");
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

//! Typed failures surfaced by the record store, the messenger, and the engine.

use thiserror::Error;

/// Failures reported by a [`crate::RecordStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store request failed: {0}")]
    Request(String),
    #[error("record store returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("record store response could not be decoded: {0}")]
    Decode(String),
    #[error("invalid cell address row={row} column={column}")]
    InvalidCell { row: u32, column: u32 },
    #[error("record store request timed out after {0} ms")]
    Timeout(u64),
}

/// Failures reported by a [`crate::Messenger`] implementation.
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("messenger request failed: {0}")]
    Request(String),
    #[error("messenger rejected {operation}: {description}")]
    Rejected {
        operation: &'static str,
        description: String,
    },
}

/// Per-event failures; [`crate::Engine::dispatch`] turns each into a reply.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("name needs at least two words of two or more characters")]
    AmbiguousOrEmptyInput,
    #[error("no roster row matches the supplied name")]
    NoMatch,
    #[error("forwarded message origin '{origin}' carries no usable identity")]
    UnresolvableIdentity { origin: &'static str },
    #[error("record store write failed: {0}")]
    StoreWriteFailure(#[source] StoreError),
    #[error("record store is unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("malformed control payload '{0}'")]
    MalformedControlPayload(String),
}

impl EngineError {
    /// Stable reason code used in dispatch outcomes and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AmbiguousOrEmptyInput => "ambiguous_or_empty_input",
            Self::NoMatch => "no_match",
            Self::UnresolvableIdentity { .. } => "unresolvable_identity",
            Self::StoreWriteFailure(_) => "store_write_failure",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::MalformedControlPayload(_) => "malformed_control_payload",
        }
    }
}

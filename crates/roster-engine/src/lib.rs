//! Identity resolution and stage-progression engine for the event roster.
//!
//! Binds chat identities to roster rows by fuzzy full-name matching, walks
//! each row through registered → credentials-issued → paid (with a
//! capacity-annotated batch pick on the second step), and reports live
//! statistics. Storage and messaging are reached only through the
//! [`RecordStore`] and [`Messenger`] traits.
//!
//! ```rust
//! use roster_engine::{resolve_row, ColumnLayout};
//!
//! let table = vec![
//!     vec!["#".to_string(), "Full name".to_string()],
//!     vec!["1".to_string(), "Ivan Petrov".to_string()],
//! ];
//! let row = resolve_row("petrov ivan", &table, &ColumnLayout::default()).unwrap();
//! assert_eq!(row, 2);
//! ```

pub mod binding;
pub mod engine;
pub mod error;
pub mod event;
pub mod layout;
pub mod messenger;
pub mod normalize;
pub mod resolver;
pub mod stage;
pub mod stats;
pub mod store;

/// Chat-platform user identifier.
pub type IdentityId = i64;
/// 1-based row position in the roster sheet.
pub type RowIndex = u32;

pub use binding::{BindingCache, BindingClaim};
pub use engine::{DispatchOutcome, Engine, EngineConfig};
pub use error::{EngineError, MessengerError, StoreError};
pub use event::{ButtonPress, ChatIdentity, ForwardOrigin, InboundEvent, InboundMessage};
pub use layout::{BatchPolicy, ColumnLayout, LayoutError, MarkerPalette, RowMarker};
pub use messenger::{Button, Keyboard, MessageRef, Messenger};
pub use normalize::{normalize_name, person_key, NameTokenSet};
pub use resolver::{resolve_row, NameQuery};
pub use stage::{batch_keyboard, stage_keyboard, ControlPayload, Stage};
pub use stats::{batch_fill_counts, compute_stats, StatsSnapshot};
pub use store::{InMemoryRecordStore, RecordStore, Snapshot};

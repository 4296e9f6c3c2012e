//! Fuzzy full-name resolution against a roster snapshot.
//!
//! A row matches when its name shares at least two normalized tokens with the
//! query. The scan runs in storage order from row 1 (header included) and the
//! first match wins; there is no scoring.

use crate::error::EngineError;
use crate::layout::ColumnLayout;
use crate::normalize::{normalize_name, shared_token_count, NameTokenSet};
use crate::RowIndex;

pub const MIN_SHARED_TOKENS: usize = 2;

/// A search name that has already passed the minimum-token check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameQuery {
    tokens: NameTokenSet,
}

impl NameQuery {
    /// Fails with [`EngineError::AmbiguousOrEmptyInput`] before any table access
    /// when the text has fewer than two usable tokens.
    pub fn parse(text: &str) -> Result<Self, EngineError> {
        let tokens = normalize_name(text);
        if tokens.len() < MIN_SHARED_TOKENS {
            return Err(EngineError::AmbiguousOrEmptyInput);
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &NameTokenSet {
        &self.tokens
    }

    pub fn find_row(&self, snapshot: &[Vec<String>], layout: &ColumnLayout) -> Option<RowIndex> {
        snapshot.iter().enumerate().find_map(|(index, row)| {
            let name = layout.cell(row, layout.name)?;
            let row_tokens = normalize_name(name);
            if shared_token_count(&self.tokens, &row_tokens) >= MIN_SHARED_TOKENS {
                RowIndex::try_from(index + 1).ok()
            } else {
                None
            }
        })
    }
}

/// Resolves free text to the first matching 1-based row.
pub fn resolve_row(
    text: &str,
    snapshot: &[Vec<String>],
    layout: &ColumnLayout,
) -> Result<RowIndex, EngineError> {
    NameQuery::parse(text)?
        .find_row(snapshot, layout)
        .ok_or(EngineError::NoMatch)
}

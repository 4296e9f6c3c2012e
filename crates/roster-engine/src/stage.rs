//! Onboarding stages, operator control payloads, and their keyboards.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::layout::BatchPolicy;
use crate::messenger::{Button, Keyboard};
use crate::RowIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Registered,
    CredentialsIssued,
    Paid,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Registered, Stage::CredentialsIssued, Stage::Paid];

    pub fn code(self) -> u8 {
        match self {
            Self::Registered => 1,
            Self::CredentialsIssued => 2,
            Self::Paid => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.code() == code)
    }

    /// Value written to the stage column.
    pub fn label(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::CredentialsIssued => "credentials-issued",
            Self::Paid => "paid",
        }
    }

    /// Parses a stage cell. Accepts the label (any case) or the bare numeric code.
    pub fn from_cell(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Self::from_code(code);
        }
        Self::ALL
            .into_iter()
            .find(|stage| stage.label().eq_ignore_ascii_case(trimmed))
    }

    pub fn button_label(self) -> &'static str {
        match self {
            Self::Registered => "1 • Registered",
            Self::CredentialsIssued => "2 • Credentials issued",
            Self::Paid => "3 • Paid",
        }
    }

    pub fn confirmation(self, batch: Option<u8>) -> String {
        match (self, batch) {
            (Self::CredentialsIssued, Some(batch)) => {
                format!("→ credentials issued ✓ (batch {batch})")
            }
            (Self::CredentialsIssued, None) => "→ credentials issued ✓".to_string(),
            (Self::Registered, _) => "→ registered ✓".to_string(),
            (Self::Paid, _) => "→ paid ✓".to_string(),
        }
    }
}

/// Decoded button payload.
///
/// Wire grammar: `s<stage>_<row>` picks a stage, `b<batch>_<row>` picks a
/// requisite batch for the credentials-issued transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPayload {
    Stage { stage: Stage, row: RowIndex },
    Batch { batch: u8, row: RowIndex },
}

/// Plain ASCII digits only; `str::parse` would also take a leading `+`.
fn parse_digits<T: std::str::FromStr>(raw: &str) -> Option<T> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

impl ControlPayload {
    pub fn parse(raw: &str, batches: &BatchPolicy) -> Result<Self, EngineError> {
        let malformed = || EngineError::MalformedControlPayload(raw.to_string());
        let (head, row) = raw.trim().split_once('_').ok_or_else(malformed)?;
        let row = parse_digits::<RowIndex>(row)
            .filter(|row| *row >= 1)
            .ok_or_else(malformed)?;
        let mut chars = head.chars();
        let kind = chars.next().ok_or_else(malformed)?;
        let number = parse_digits::<u8>(chars.as_str()).ok_or_else(malformed)?;
        match kind {
            's' => {
                let stage = Stage::from_code(number).ok_or_else(malformed)?;
                Ok(Self::Stage { stage, row })
            }
            'b' if batches.contains(number) => Ok(Self::Batch { batch: number, row }),
            _ => Err(malformed()),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Stage { stage, row } => format!("s{}_{row}", stage.code()),
            Self::Batch { batch, row } => format!("b{batch}_{row}"),
        }
    }

    pub fn row(&self) -> RowIndex {
        match self {
            Self::Stage { row, .. } | Self::Batch { row, .. } => *row,
        }
    }
}

/// One button per stage, one per line.
pub fn stage_keyboard(row: RowIndex) -> Keyboard {
    Stage::ALL
        .into_iter()
        .map(|stage| {
            vec![Button::new(
                stage.button_label(),
                ControlPayload::Stage { stage, row }.encode(),
            )]
        })
        .collect()
}

/// Batch picker annotated with live fill counts (`fill_counts[0]` is batch 1).
pub fn batch_keyboard(row: RowIndex, batches: &BatchPolicy, fill_counts: &[usize]) -> Keyboard {
    let buttons: Vec<Button> = (1..=batches.count)
        .map(|batch| {
            let fill = fill_counts
                .get(usize::from(batch - 1))
                .copied()
                .unwrap_or_default();
            Button::new(
                format!("Batch {batch} · {fill}/{}", batches.capacity),
                ControlPayload::Batch { batch, row }.encode(),
            )
        })
        .collect();
    buttons.chunks(2).map(<[Button]>::to_vec).collect()
}

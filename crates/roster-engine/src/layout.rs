//! Sheet column layout, batch policy, and stage marker palette.
//!
//! Column positions have moved between deployments, so every position the
//! engine touches is carried here instead of being hard-coded at call sites.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::Stage;
use crate::RowIndex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("column '{0}' must be 1-based (got 0)")]
    ZeroColumn(&'static str),
    #[error("columns '{first}' and '{second}' both point at column {column}")]
    DuplicateColumn {
        first: &'static str,
        second: &'static str,
        column: u32,
    },
    #[error("batch count must be between 1 and 99 (got {0})")]
    BatchCount(u8),
    #[error("invalid marker color '{0}' (expected #RRGGBB)")]
    MarkerColor(String),
}

/// 1-based column positions of the roster sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub name: u32,
    pub identity_id: u32,
    pub handle: u32,
    pub stage: u32,
    pub batch: u32,
    /// Rows at the top of the sheet that statistics skip.
    pub header_rows: u32,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            name: 2,
            identity_id: 7,
            handle: 8,
            stage: 9,
            batch: 10,
            header_rows: 1,
        }
    }
}

impl ColumnLayout {
    pub fn validate(&self) -> Result<(), LayoutError> {
        let columns = [
            ("name", self.name),
            ("identity_id", self.identity_id),
            ("handle", self.handle),
            ("stage", self.stage),
            ("batch", self.batch),
        ];
        for (index, (label, column)) in columns.iter().enumerate() {
            if *column == 0 {
                return Err(LayoutError::ZeroColumn(label));
            }
            if let Some((other, _)) = columns[..index].iter().find(|(_, seen)| seen == column) {
                return Err(LayoutError::DuplicateColumn {
                    first: other,
                    second: label,
                    column: *column,
                });
            }
        }
        Ok(())
    }

    /// Returns the trimmed value of a 1-based column in a snapshot row, if present.
    pub fn cell<'a>(&self, row: &'a [String], column: u32) -> Option<&'a str> {
        let index = usize::try_from(column).ok()?.checked_sub(1)?;
        row.get(index).map(|value| value.trim())
    }

    /// True when `row_index` lies past the header block.
    pub fn is_data_row(&self, row_index: RowIndex) -> bool {
        row_index > self.header_rows
    }
}

/// Number of requisite batches and the advisory per-batch capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPolicy {
    pub count: u8,
    pub capacity: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            count: 8,
            capacity: 15,
        }
    }
}

impl BatchPolicy {
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.count == 0 || self.count > 99 {
            return Err(LayoutError::BatchCount(self.count));
        }
        Ok(())
    }

    pub fn contains(&self, batch: u8) -> bool {
        (1..=self.count).contains(&batch)
    }
}

/// Background color applied to a row; components are 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMarker {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RowMarker {
    pub fn parse_hex(raw: &str) -> Result<Self, LayoutError> {
        let invalid = || LayoutError::MarkerColor(raw.to_string());
        let hex = raw.trim().strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };
        Ok(Self {
            red: channel(0..2)?,
            green: channel(2..4)?,
            blue: channel(4..6)?,
        })
    }

    /// Components scaled to `0.0..=1.0`, the form spreadsheet APIs expect.
    pub fn unit_rgb(&self) -> (f32, f32, f32) {
        (
            f32::from(self.red) / 255.0,
            f32::from(self.green) / 255.0,
            f32::from(self.blue) / 255.0,
        )
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

/// One marker per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerPalette {
    pub registered: RowMarker,
    pub credentials_issued: RowMarker,
    pub paid: RowMarker,
}

impl Default for MarkerPalette {
    fn default() -> Self {
        Self {
            registered: RowMarker {
                red: 0xAD,
                green: 0xD8,
                blue: 0xE6,
            },
            credentials_issued: RowMarker {
                red: 0xFF,
                green: 0xA5,
                blue: 0x00,
            },
            paid: RowMarker {
                red: 0x90,
                green: 0xEE,
                blue: 0x90,
            },
        }
    }
}

impl MarkerPalette {
    pub fn from_hex(
        registered: &str,
        credentials_issued: &str,
        paid: &str,
    ) -> Result<Self, LayoutError> {
        Ok(Self {
            registered: RowMarker::parse_hex(registered)?,
            credentials_issued: RowMarker::parse_hex(credentials_issued)?,
            paid: RowMarker::parse_hex(paid)?,
        })
    }

    pub fn marker_for(&self, stage: Stage) -> RowMarker {
        match stage {
            Stage::Registered => self.registered,
            Stage::CredentialsIssued => self.credentials_issued,
            Stage::Paid => self.paid,
        }
    }
}

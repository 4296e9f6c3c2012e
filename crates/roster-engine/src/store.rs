//! Record store capability and an in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::layout::RowMarker;
use crate::RowIndex;

/// Full table contents, rows in storage order; rows may be ragged.
pub type Snapshot = Vec<Vec<String>>;

/// Remote tabular store holding the roster. Rows and columns are 1-based.
///
/// Each call is an independent round trip; nothing is batched or rolled back.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn snapshot(&self) -> Result<Snapshot, StoreError>;
    async fn get_cell(&self, row: RowIndex, column: u32) -> Result<String, StoreError>;
    async fn set_cell(&self, row: RowIndex, column: u32, value: &str) -> Result<(), StoreError>;
    async fn set_row_marker(&self, row: RowIndex, marker: RowMarker) -> Result<(), StoreError>;
}

/// In-memory store for tests, dry runs, and local experimentation.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    rows: RwLock<Snapshot>,
    markers: RwLock<HashMap<RowIndex, RowMarker>>,
    snapshot_calls: AtomicUsize,
    cell_writes: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<I, R, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        Self {
            rows: RwLock::new(rows),
            ..Self::default()
        }
    }

    pub async fn rows(&self) -> Snapshot {
        self.rows.read().await.clone()
    }

    /// Cell value, or empty when the cell lies outside the written area.
    pub async fn cell(&self, row: RowIndex, column: u32) -> String {
        let rows = self.rows.read().await;
        cell_index(row, column)
            .and_then(|(row, column)| rows.get(row)?.get(column).cloned())
            .unwrap_or_default()
    }

    pub async fn marker(&self, row: RowIndex) -> Option<RowMarker> {
        self.markers.read().await.get(&row).copied()
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn cell_writes(&self) -> usize {
        self.cell_writes.load(Ordering::SeqCst)
    }
}

fn cell_index(row: RowIndex, column: u32) -> Option<(usize, usize)> {
    let row = usize::try_from(row).ok()?.checked_sub(1)?;
    let column = usize::try_from(column).ok()?.checked_sub(1)?;
    Some((row, column))
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.read().await.clone())
    }

    async fn get_cell(&self, row: RowIndex, column: u32) -> Result<String, StoreError> {
        if cell_index(row, column).is_none() {
            return Err(StoreError::InvalidCell { row, column });
        }
        Ok(self.cell(row, column).await)
    }

    async fn set_cell(&self, row: RowIndex, column: u32, value: &str) -> Result<(), StoreError> {
        let (row_index, column_index) =
            cell_index(row, column).ok_or(StoreError::InvalidCell { row, column })?;
        let mut rows = self.rows.write().await;
        if rows.len() <= row_index {
            rows.resize_with(row_index + 1, Vec::new);
        }
        let cells = &mut rows[row_index];
        if cells.len() <= column_index {
            cells.resize_with(column_index + 1, String::new);
        }
        cells[column_index] = value.to_string();
        self.cell_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_row_marker(&self, row: RowIndex, marker: RowMarker) -> Result<(), StoreError> {
        if row == 0 {
            return Err(StoreError::InvalidCell { row, column: 0 });
        }
        self.markers.write().await.insert(row, marker);
        Ok(())
    }
}

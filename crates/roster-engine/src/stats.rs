//! Live roster statistics recomputed from a full snapshot on every request.
//!
//! Rows inside the header block are skipped. People are deduplicated by
//! [`person_key`]; only the first row seen for a key contributes stage and
//! batch counts.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::layout::{BatchPolicy, ColumnLayout};
use crate::normalize::person_key;
use crate::stage::Stage;
use crate::RowIndex;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_unique: usize,
    pub registered: usize,
    pub credentials_issued: usize,
    pub paid: usize,
    /// Fill per batch; index 0 is batch 1.
    pub batch_fill: Vec<usize>,
}

impl StatsSnapshot {
    pub fn stage_count(&self, stage: Stage) -> usize {
        match stage {
            Stage::Registered => self.registered,
            Stage::CredentialsIssued => self.credentials_issued,
            Stage::Paid => self.paid,
        }
    }

    pub fn render(&self, batches: &BatchPolicy) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Participants: {}", self.total_unique);
        let _ = writeln!(out, "1 • registered: {}", self.registered);
        let _ = writeln!(out, "2 • credentials issued: {}", self.credentials_issued);
        let _ = writeln!(out, "3 • paid: {}", self.paid);
        out.push_str("Batches:");
        for (index, fill) in self.batch_fill.iter().enumerate() {
            let marker = if *fill > batches.capacity { " (over capacity)" } else { "" };
            let _ = write!(out, "\n{}: {fill}/{}{marker}", index + 1, batches.capacity);
        }
        out
    }
}

fn data_rows<'a>(
    snapshot: &'a [Vec<String>],
    layout: &'a ColumnLayout,
) -> impl Iterator<Item = &'a Vec<String>> + 'a {
    snapshot.iter().enumerate().filter_map(move |(index, row)| {
        let row_index = RowIndex::try_from(index + 1).ok()?;
        layout.is_data_row(row_index).then_some(row)
    })
}

fn parse_batch(raw: &str, batches: &BatchPolicy) -> Option<u8> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|batch| batches.contains(*batch))
}

pub fn compute_stats(
    snapshot: &[Vec<String>],
    layout: &ColumnLayout,
    batches: &BatchPolicy,
) -> StatsSnapshot {
    let mut stats = StatsSnapshot {
        batch_fill: vec![0; usize::from(batches.count)],
        ..StatsSnapshot::default()
    };
    let mut seen = HashSet::new();
    for row in data_rows(snapshot, layout) {
        let key = person_key(layout.cell(row, layout.name).unwrap_or_default());
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        stats.total_unique += 1;
        match layout.cell(row, layout.stage).and_then(Stage::from_cell) {
            Some(Stage::Registered) => stats.registered += 1,
            Some(Stage::CredentialsIssued) => stats.credentials_issued += 1,
            Some(Stage::Paid) => stats.paid += 1,
            None => {}
        }
        if let Some(batch) = layout
            .cell(row, layout.batch)
            .and_then(|raw| parse_batch(raw, batches))
        {
            stats.batch_fill[usize::from(batch - 1)] += 1;
        }
    }
    stats
}

/// Live per-batch fill used by the batch picker: every data row whose batch
/// cell holds the batch number, without person dedup.
pub fn batch_fill_counts(
    snapshot: &[Vec<String>],
    layout: &ColumnLayout,
    batches: &BatchPolicy,
) -> Vec<usize> {
    let mut fill = vec![0; usize::from(batches.count)];
    for row in data_rows(snapshot, layout) {
        if let Some(batch) = layout
            .cell(row, layout.batch)
            .and_then(|raw| parse_batch(raw, batches))
        {
            fill[usize::from(batch - 1)] += 1;
        }
    }
    fill
}

//! Decoding of the agent payload into per-table row sets.

use std::collections::BTreeMap;

use grant_discovery_sdk::{SnapshotEntry, SnapshotQueryKey};
use tracing::warn;

/// One snapshot row; `None` is SQL NULL.
pub type SnapshotRow = Vec<Option<String>>;

/// Rows grouped by table key, `[n]` suffixes stripped and chunks concatenated.
#[derive(Debug, Default, Clone)]
pub struct SnapshotTables {
    tables: BTreeMap<String, Vec<SnapshotRow>>,
}

impl SnapshotTables {
    /// Decode the raw JSON payload.
    ///
    /// Entries with a failed status or a malformed key are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is not an array of snapshot entries.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<SnapshotEntry> = serde_json::from_str(raw)?;
        Ok(Self::from_entries(entries))
    }

    #[must_use]
    pub fn from_entries(entries: Vec<SnapshotEntry>) -> Self {
        let mut tables: BTreeMap<String, Vec<SnapshotRow>> = BTreeMap::new();

        for entry in entries {
            if !entry.status.is_success() {
                warn!(query_key = %entry.query_key, "Skipping snapshot entry with failed status");
                continue;
            }
            let key = match entry.query_key.parse::<SnapshotQueryKey>() {
                Ok(key) => key,
                Err(e) => {
                    warn!(query_key = %entry.query_key, error = %e, "Skipping snapshot entry with malformed key");
                    continue;
                }
            };

            let rows = tables.entry(key.table).or_default();
            rows.extend(
                entry
                    .result
                    .into_iter()
                    .map(|row| row.into_iter().map(cell_text).collect()),
            );
        }

        Self { tables }
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[SnapshotRow])> {
        self.tables
            .iter()
            .map(|(key, rows)| (key.as_str(), rows.as_slice()))
    }

    #[must_use]
    pub fn rows(&self, table: &str) -> Option<&[SnapshotRow]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

fn cell_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

//! Snapshot payload delivered by the remote agent.
//!
//! The payload is a JSON array of [`SnapshotEntry`]. Each entry carries the
//! rows of one catalog query; large tables are split across several entries
//! whose keys differ only by a `[n]` suffix (`mysql.user[0]`, `mysql.user[1]`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub query_key: String,
    pub status: SnapshotStatus,
    /// Row x column cells as returned by the source database.
    #[serde(default)]
    pub result: Vec<Vec<serde_json::Value>>,
}

/// Agent-reported status; older agents send a boolean, newer ones a word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotStatus {
    Flag(bool),
    Text(String),
}

impl SnapshotStatus {
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::Flag(ok) => *ok,
            Self::Text(word) => {
                word.eq_ignore_ascii_case("success") || word.eq_ignore_ascii_case("ok")
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryKeyError {
    #[error("empty query key")]
    Empty,
    #[error("malformed ordinal suffix in query key '{0}'")]
    BadOrdinal(String),
}

/// A `schema.table` key with an optional `[n]` disambiguation suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotQueryKey {
    pub table: String,
    pub ordinal: Option<u32>,
}

impl SnapshotQueryKey {
    #[must_use]
    pub fn new(table: impl Into<String>, ordinal: Option<u32>) -> Self {
        Self {
            table: table.into(),
            ordinal,
        }
    }
}

impl FromStr for SnapshotQueryKey {
    type Err = QueryKeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(QueryKeyError::Empty);
        }

        let Some(open) = raw.rfind('[').filter(|_| raw.ends_with(']')) else {
            return Ok(Self::new(raw, None));
        };

        let digits = &raw[open + 1..raw.len() - 1];
        let ordinal = digits
            .parse::<u32>()
            .map_err(|_| QueryKeyError::BadOrdinal(raw.to_owned()))?;
        let table = &raw[..open];
        if table.is_empty() {
            return Err(QueryKeyError::Empty);
        }
        Ok(Self::new(table, Some(ordinal)))
    }
}

impl fmt::Display for SnapshotQueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ordinal {
            Some(n) => write!(f, "{}[{n}]", self.table),
            None => f.write_str(&self.table),
        }
    }
}

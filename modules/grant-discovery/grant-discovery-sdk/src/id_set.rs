//! Decoder for stored template-id sets.
//!
//! The id-set column has been written in three shapes over time: a JSON
//! array (`[1,2,3]`), a single JSON number (`7`) and a comma-separated
//! string (`"1, 2,3"`, with or without JSON quotes). All of them decode
//! through [`IdSet::parse`], which tries the shapes in that fixed order.

use std::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdSetError {
    #[error("invalid id '{token}' in id set '{raw}'")]
    InvalidId { raw: String, token: String },
}

/// Accepted encodings, tried top to bottom.
#[derive(Deserialize)]
#[serde(untagged)]
enum Encoded {
    List(Vec<i64>),
    Single(i64),
    Csv(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSet(BTreeSet<i64>);

impl IdSet {
    /// Decode a stored id set.
    ///
    /// Text that is not valid JSON is treated as a bare comma-separated list.
    /// Empty input decodes to an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`IdSetError::InvalidId`] when a comma-separated token is not an integer.
    pub fn parse(raw: &str) -> Result<Self, IdSetError> {
        let trimmed = raw.trim();
        let encoded = serde_json::from_str::<Encoded>(trimmed)
            .unwrap_or_else(|_| Encoded::Csv(trimmed.to_owned()));

        match encoded {
            Encoded::List(ids) => Ok(Self(ids.into_iter().collect())),
            Encoded::Single(id) => Ok(Self(BTreeSet::from([id]))),
            Encoded::Csv(text) => parse_csv(raw, &text).map(Self),
        }
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeSet<i64> {
        self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn parse_csv(raw: &str, text: &str) -> Result<BTreeSet<i64>, IdSetError> {
    text.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<i64>().map_err(|_| IdSetError::InvalidId {
                raw: raw.to_owned(),
                token: token.to_owned(),
            })
        })
        .collect()
}

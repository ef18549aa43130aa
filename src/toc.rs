//! Table of contents for embedded attachments
//!
//! The TOC is stored as a compact JSON array between the first two
//! boundaries. Entry order is the order of the attachment data that follows,
//! so offsets are implicit: the first attachment starts right after the
//! second boundary and every other one right after its predecessor.
//!
//! ```text
//! [{"Name":"config","Size":120},{"Name":"logo.png","Size":5321}]
//! ```

use crate::error::{Result, StowError};
use serde::{Deserialize, Serialize};
use std::io;

/// A single attachment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TocEntry {
    /// Attachment name
    #[serde(rename = "Name")]
    pub name: String,

    /// Attachment size in bytes
    #[serde(rename = "Size")]
    pub size: u64,
}

/// Ordered list of attachment records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Toc {
    entries: Vec<TocEntry>,
}

impl Toc {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; its data follows the data of all previous records
    pub fn push(&mut self, name: impl Into<String>, size: u64) {
        self.entries.push(TocEntry {
            name: name.into(),
            size,
        });
    }

    /// Records in data order
    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    /// Iterate records in data order
    pub fn iter(&self) -> std::slice::Iter<'_, TocEntry> {
        self.entries.iter()
    }

    /// Number of records, duplicates included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of attachment bytes, `None` on overflow
    pub fn data_len(&self) -> Option<u64> {
        self.entries
            .iter()
            .try_fold(0u64, |total, entry| total.checked_add(entry.size))
    }

    /// Encode as compact JSON
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON
    ///
    /// # Errors
    ///
    /// Returns `MalformedToc` for invalid JSON, unknown or missing fields,
    /// negative sizes and trailing data.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(StowError::MalformedToc)
    }
}

impl FromIterator<TocEntry> for Toc {
    fn from_iter<I: IntoIterator<Item = TocEntry>>(iter: I) -> Self {
        Toc {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Toc {
    type Item = &'a TocEntry;
    type IntoIter = std::slice::Iter<'a, TocEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

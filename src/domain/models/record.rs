//! Source record domain models
//!
//! A source record is the metadata stored 1:1 next to every vector in the index.
//! It is what search returns and what answers cite.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a stored record, assigned by the index in insertion order.
pub type RecordId = u64;

/// Kind of content a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Text,
    Image,
}

impl RecordKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

/// Metadata attached to one stored vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Unique, never reused within one index
    pub id: RecordId,

    /// `text` or `image`
    #[serde(rename = "type")]
    pub kind: RecordKind,

    /// Origin path or identifier
    pub source: String,

    /// Chunk text, or a caption/placeholder for images
    pub content: String,

    /// Position of the chunk within its document (text records only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,

    /// Page of the originating document, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl SourceRecord {
    /// Short, single-line citation label such as `notes.md#2`.
    pub fn citation(&self) -> String {
        match (self.chunk_index, self.page) {
            (Some(chunk), Some(page)) => format!("{} (page {page}, chunk {chunk})", self.source),
            (Some(chunk), None) => format!("{}#{chunk}", self.source),
            (None, Some(page)) => format!("{} (page {page})", self.source),
            (None, None) => self.source.clone(),
        }
    }
}

/// A record before the index has assigned it an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub kind: RecordKind,
    pub source: String,
    pub content: String,
    pub chunk_index: Option<usize>,
    pub page: Option<u32>,
}

impl NewRecord {
    /// Record for one chunk of a text document.
    pub fn text_chunk(source: impl Into<String>, content: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            kind: RecordKind::Text,
            source: source.into(),
            content: content.into(),
            chunk_index: Some(chunk_index),
            page: None,
        }
    }

    /// Attach the 1-based page the content was extracted from.
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Record for an image file.
    pub fn image(source: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Image,
            source: source.into(),
            content: caption.into(),
            chunk_index: None,
            page: None,
        }
    }

    pub(crate) fn into_record(self, id: RecordId) -> SourceRecord {
        SourceRecord {
            id,
            kind: self.kind,
            source: self.source,
            content: self.content,
            chunk_index: self.chunk_index,
            page: self.page,
        }
    }
}

/// A search hit: the record plus its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: SourceRecord,
    pub score: f32,
}

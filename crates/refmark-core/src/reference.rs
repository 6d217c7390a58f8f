//! The reference index citation markers are resolved against.
//!
//! A `ReferenceIndex` is an immutable snapshot supplied with each render.
//! The reference collaborator delivers it as JSON; absent or `null`
//! sequences decode as empty rather than failing.

use serde::{Deserialize, Deserializer};

use crate::ReferenceError;

/// Chunks and document aggregates for one assistant message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReferenceIndex {
    /// Retrieved passages; citation markers index into this sequence.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub chunks: Vec<Chunk>,
    /// Source documents, looked up by `doc_id`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub doc_aggs: Vec<DocumentAggregate>,
}

/// A retrieved passage of source content.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Chunk {
    #[serde(default, alias = "chunk_id")]
    pub id: String,
    #[serde(default, alias = "doc_id")]
    pub document_id: String,
    /// Passage text; may contain HTML and is sanitized before display.
    #[serde(default, alias = "content_with_weight")]
    pub content: String,
    #[serde(default, alias = "img_id")]
    pub image_id: Option<String>,
}

/// Metadata for a source document referenced by one or more chunks.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DocumentAggregate {
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub doc_name: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl ReferenceIndex {
    /// An index with no chunks and no documents.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode the reference collaborator's JSON payload.
    ///
    /// An empty or whitespace-only payload is an empty index.
    pub fn from_json(json: &str) -> Result<Self, ReferenceError> {
        if json.trim().is_empty() || json.trim() == "null" {
            return Ok(Self::empty());
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Chunk at a zero-based marker index, if in range.
    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// First document aggregate whose id matches.
    pub fn document(&self, doc_id: &str) -> Option<&DocumentAggregate> {
        self.doc_aggs.iter().find(|d| d.doc_id == doc_id)
    }

    /// Document owning the chunk at `index`.
    pub fn document_for_chunk(&self, index: usize) -> Option<&DocumentAggregate> {
        self.chunk(index)
            .and_then(|chunk| self.document(&chunk.document_id))
    }

    /// Ids of every aggregated document, in index order.
    pub fn document_ids(&self) -> Vec<String> {
        self.doc_aggs.iter().map(|d| d.doc_id.clone()).collect()
    }

    /// Whether there is nothing to resolve against.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.doc_aggs.is_empty()
    }
}

impl Chunk {
    /// Image attached to this chunk, treating an empty id as none.
    pub fn image(&self) -> Option<&str> {
        self.image_id.as_deref().filter(|id| !id.is_empty())
    }
}

impl DocumentAggregate {
    /// Lowercased file extension of `doc_name` (the whole name if it has no dot).
    pub fn extension(&self) -> String {
        self.doc_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }

    /// Whether the document opens in the in-app viewer instead of a new tab.
    pub fn is_pdf(&self) -> bool {
        self.extension() == "pdf"
    }

    /// The URL, treating an empty string as none.
    pub fn link(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

//! Transformer and collaborator traits.

use std::collections::HashMap;

use crate::{Chunk, Document};

/// Transform a document (same IR, modified content).
///
/// Transforms are total: malformed input is absorbed into a degraded but
/// valid tree, never reported as an error.
pub trait Transformer: Send + Sync {
    /// Name of this transformer.
    fn name(&self) -> &str;

    /// Transform a document.
    fn transform(&self, doc: Document) -> Document;
}

/// Document id to thumbnail handle (a URL or data URI).
pub trait ThumbnailLookup {
    fn thumbnail(&self, doc_id: &str) -> Option<&str>;
}

impl ThumbnailLookup for HashMap<String, String> {
    fn thumbnail(&self, doc_id: &str) -> Option<&str> {
        self.get(doc_id).map(String::as_str).filter(|t| !t.is_empty())
    }
}

/// No thumbnails known yet.
pub struct NoThumbnails;

impl ThumbnailLookup for NoThumbnails {
    fn thumbnail(&self, _doc_id: &str) -> Option<&str> {
        None
    }
}

/// Host callback for opening a source document in the in-app viewer.
pub trait DocumentClick {
    fn click_document(&self, document_id: &str, chunk: &Chunk);
}

impl<F> DocumentClick for F
where
    F: Fn(&str, &Chunk),
{
    fn click_document(&self, document_id: &str, chunk: &Chunk) {
        self(document_id, chunk)
    }
}

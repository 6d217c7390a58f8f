//! Thumbnail cache keyed by the reference index's document ids.
//!
//! Thumbnails arrive asynchronously from an external collaborator. The
//! cache hands out a [`ThumbnailRequest`] whenever its key set changes and
//! only accepts results for the newest request, so a slow fetch for an
//! older reference index can never overwrite the current one.

use std::collections::{BTreeSet, HashMap};

use refmark_core::{FetchError, ThumbnailLookup};

/// Fetches thumbnail handles for a set of document ids.
pub trait ThumbnailSource {
    fn fetch(&self, doc_ids: &[String]) -> Result<HashMap<String, String>, FetchError>;
}

/// A fixed map of thumbnails, e.g. loaded from a file.
impl ThumbnailSource for HashMap<String, String> {
    fn fetch(&self, doc_ids: &[String]) -> Result<HashMap<String, String>, FetchError> {
        Ok(doc_ids
            .iter()
            .filter_map(|id| Some((id.clone(), self.get(id)?.clone())))
            .collect())
    }
}

/// A pending fetch for one generation of the key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub generation: u64,
    pub ids: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ThumbnailCache {
    keys: BTreeSet<String>,
    generation: u64,
    thumbnails: HashMap<String, String>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-key the cache on a new set of document ids.
    ///
    /// Returns the request to fetch when the set changed and is non-empty.
    /// Any request issued before a change becomes stale.
    pub fn recompute(&mut self, ids: impl IntoIterator<Item = String>) -> Option<ThumbnailRequest> {
        let keys: BTreeSet<String> = ids.into_iter().collect();
        if keys == self.keys {
            return None;
        }

        self.keys = keys;
        self.generation += 1;
        self.thumbnails.clear();
        log::debug!(
            "thumbnail keys changed ({} ids), generation {}",
            self.keys.len(),
            self.generation
        );

        if self.keys.is_empty() {
            return None;
        }
        Some(ThumbnailRequest {
            generation: self.generation,
            ids: self.keys.iter().cloned().collect(),
        })
    }

    /// Store the result of `request`. Returns whether the cache changed.
    ///
    /// Results for stale requests are discarded. A failed fetch leaves the
    /// cache empty so popovers fall back to file-type icons.
    pub fn fulfill(
        &mut self,
        request: &ThumbnailRequest,
        result: Result<HashMap<String, String>, FetchError>,
    ) -> bool {
        if request.generation != self.generation {
            log::warn!(
                "discarding thumbnails for generation {} (current {})",
                request.generation,
                self.generation
            );
            return false;
        }
        match result {
            Ok(thumbnails) => {
                self.thumbnails = thumbnails
                    .into_iter()
                    .filter(|(id, _)| self.keys.contains(id))
                    .collect();
                true
            }
            Err(e) => {
                log::warn!("{e}; using file-type icons");
                false
            }
        }
    }

    /// Fetch `request` from `source` synchronously and store the result.
    pub fn load(&mut self, source: &dyn ThumbnailSource, request: &ThumbnailRequest) -> bool {
        let result = source.fetch(&request.ids);
        self.fulfill(request, result)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.thumbnails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thumbnails.is_empty()
    }
}

impl ThumbnailLookup for ThumbnailCache {
    fn thumbnail(&self, doc_id: &str) -> Option<&str> {
        self.thumbnails.thumbnail(doc_id)
    }
}

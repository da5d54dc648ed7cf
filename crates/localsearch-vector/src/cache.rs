//! Embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! Seeded from the vectors of the snapshot being replaced, consulted before
//! calling a provider and written through on misses, so re-indexing an edited
//! file only embeds the chunks whose text actually changed.
use std::collections::HashMap;

use crate::index::VectorIndex;

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub content_hash: String,
    pub embedder_id: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    embedder_id: String,
    entries: HashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new(embedder_id: impl Into<String>) -> Self { Self { embedder_id: embedder_id.into(), entries: HashMap::new() } }

    /// Every vector of `index`, assumed to come from `embedder_id`.
    pub fn from_index(index: &VectorIndex, embedder_id: &str) -> Self {
        let mut cache = Self::new(embedder_id);
        for (_, rec) in index.records() {
            cache.entries.entry(rec.content_hash.clone()).or_insert_with(|| rec.vector.clone());
        }
        cache
    }

    pub fn embedder_id(&self) -> &str { &self.embedder_id }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get_many(&self, hashes: &[String]) -> HashMap<String, Vec<f32>> {
        hashes.iter().filter_map(|h| self.entries.get(h).map(|v| (h.clone(), v.clone()))).collect()
    }

    /// Entries from another embedder are ignored.
    pub fn put_many(&mut self, entries: Vec<CacheEntry>) {
        for e in entries {
            if e.embedder_id != self.embedder_id { continue; }
            self.entries.insert(e.content_hash, e.vector);
        }
    }
}

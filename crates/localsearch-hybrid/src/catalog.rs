//! Per-corpus bookkeeping owned by the indexer: chunk metadata, which chunks
//! each source produced (for cascade deletion), and freshness records.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use localsearch_core::freshness::FreshnessRecords;
use localsearch_core::{ChunkId, Corpus, DocumentId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMeta {
    pub document_id: DocumentId,
    pub title: String,
    pub source_uri: String,
    pub text: String,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    pub corpus: Corpus,
    pub embedder_id: String,
    pub dimension: usize,
    pub generation: u64,
    pub chunks: BTreeMap<ChunkId, ChunkMeta>,
    /// Source uri (file or dump) -> chunk ids it produced.
    pub sources: BTreeMap<String, Vec<ChunkId>>,
    pub freshness: FreshnessRecords,
}

impl Catalog {
    pub fn new(corpus: Corpus, embedder_id: &str, dimension: usize) -> Self {
        Self {
            corpus,
            embedder_id: embedder_id.to_string(),
            dimension,
            generation: 0,
            chunks: BTreeMap::new(),
            sources: BTreeMap::new(),
            freshness: FreshnessRecords::new(),
        }
    }

    pub fn chunk(&self, chunk_id: &str) -> Option<&ChunkMeta> { self.chunks.get(chunk_id) }

    pub fn document_count(&self) -> usize {
        self.chunks.values().map(|c| c.document_id.as_str()).collect::<BTreeSet<_>>().len()
    }

    /// Drop the uri's chunk list and metadata; returns the ids to delete from
    /// the sub-indexes.
    pub fn take_source(&mut self, uri: &str) -> Vec<ChunkId> {
        let ids = self.sources.remove(uri).unwrap_or_default();
        for id in &ids { self.chunks.remove(id); }
        ids
    }
}

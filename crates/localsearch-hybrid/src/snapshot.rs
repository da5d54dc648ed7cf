use tracing::warn;

use localsearch_core::config::{Bm25Config, TokenizerConfig};
use localsearch_core::chunking::snippet;
use localsearch_core::{Chunk, Corpus, Embedder, Error, Result, SearchHit};
use localsearch_text::Bm25Index;
use localsearch_vector::{EmbeddingRecord, VectorIndex};

use crate::catalog::{Catalog, ChunkMeta};

/// One immutable, queryable state of a corpus.
///
/// Published behind an `Arc`; writers clone it, mutate the clone and swap it
/// in, so readers never observe a half-applied change.
#[derive(Clone)]
pub struct CorpusSnapshot {
    pub corpus: Corpus,
    pub lexical: Bm25Index,
    pub vectors: VectorIndex,
    pub catalog: Catalog,
}

impl CorpusSnapshot {
    pub fn empty(corpus: Corpus, bm25: Bm25Config, tokenizer: TokenizerConfig, embedder: &dyn Embedder) -> Self {
        Self {
            corpus,
            lexical: Bm25Index::new(bm25, tokenizer),
            vectors: VectorIndex::with_dim(embedder.dim()),
            catalog: Catalog::new(corpus, embedder.id(), embedder.dim()),
        }
    }

    pub fn generation(&self) -> u64 { self.catalog.generation }
    pub fn chunk_count(&self) -> usize { self.catalog.chunks.len() }
    pub fn is_empty(&self) -> bool { self.catalog.chunks.is_empty() }

    pub fn keyword_search(&self, query: &str, top_k: usize) -> Vec<SearchHit> { self.lexical.search_text(query, top_k) }

    pub fn semantic_search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> { self.vectors.search(query_vector, top_k) }

    /// Cascade-delete every chunk produced by `uri`. Returns how many chunks
    /// were removed.
    pub fn remove_source(&mut self, uri: &str) -> usize {
        let ids = self.catalog.take_source(uri);
        for id in &ids {
            if let Err(e) = self.lexical.remove_chunk(id) { warn!(chunk = %id, error = %e, "Lexical entry already gone"); }
            if let Err(e) = self.vectors.remove_embedding(id) { warn!(chunk = %id, error = %e, "Vector entry already gone"); }
        }
        ids.len()
    }

    /// Add one chunk to both sub-indexes and the catalog, attributing it to
    /// `uri` for later cascade deletion.
    pub fn insert_chunk(&mut self, uri: &str, chunk: &Chunk, vector: Vec<f32>, content_hash: String, snippet_chars: usize) -> Result<()> {
        if self.catalog.chunks.contains_key(&chunk.id) { return Err(Error::AlreadyIndexed(chunk.id.clone())); }
        // vector first: a dimension mismatch must not leave a lexical-only entry
        self.vectors.add_embedding(&chunk.id, EmbeddingRecord {
            vector,
            title: chunk.title.clone(),
            snippet: snippet(&chunk.text, snippet_chars),
            content_hash,
        })?;
        if let Err(e) = self.lexical.add_chunk(chunk) {
            let _ = self.vectors.remove_embedding(&chunk.id);
            return Err(e);
        }
        self.catalog.chunks.insert(chunk.id.clone(), ChunkMeta {
            document_id: chunk.document_id.clone(),
            title: chunk.title.clone(),
            source_uri: chunk.source_uri.clone(),
            text: chunk.text.clone(),
            chunk_index: chunk.chunk_index,
        });
        self.catalog.sources.entry(uri.to_string()).or_default().push(chunk.id.clone());
        Ok(())
    }
}

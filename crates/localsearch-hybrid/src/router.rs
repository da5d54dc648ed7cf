//! Per-query pipeline: validate, fan out one blocking task per
//! (corpus, index kind), join, fuse with RRF, assemble results.
//!
//! Holds no state between queries; every task works on an `Arc` of a
//! published snapshot, so concurrent rebuilds never block a query.
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use localsearch_core::chunking::snippet;
use localsearch_core::config::QueryConfig;
use localsearch_core::{Corpus, Embedder, Error, IndexKind, Result, SearchResult, SourceSelector, Strategy};

use crate::fusion::{reciprocal_rank_fusion, RankedList};
use crate::snapshot::CorpusSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: i64,
    pub strategy: Strategy,
    pub source: SourceSelector,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: i64) -> Self {
        Self { query: query.into(), top_k, strategy: Strategy::Hybrid, source: SourceSelector::All }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self { self.strategy = strategy; self }
    pub fn source(mut self, source: SourceSelector) -> Self { self.source = source; self }
}

pub struct QueryRouter {
    embedder: Arc<dyn Embedder>,
    config: QueryConfig,
}

impl QueryRouter {
    pub fn new(embedder: Arc<dyn Embedder>, config: QueryConfig) -> Self { Self { embedder, config } }

    /// Effective result count: rejects blank queries and non-positive
    /// `top_k`, clamps to `max_top_k`.
    pub fn validate(&self, request: &SearchRequest) -> Result<usize> {
        if request.query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        if request.top_k <= 0 {
            return Err(Error::Validation(format!("top_k must be positive, got {}", request.top_k)));
        }
        let top_k = usize::try_from(request.top_k).unwrap_or(usize::MAX);
        Ok(top_k.min(self.config.max_top_k))
    }

    /// `snapshots` holds whatever each corpus has published; absent or
    /// empty corpora contribute empty candidate lists.
    pub async fn execute(&self, request: &SearchRequest, snapshots: &[(Corpus, Option<Arc<CorpusSnapshot>>)]) -> Result<Vec<SearchResult>> {
        let top_k = self.validate(request)?;
        let fetch = top_k.saturating_mul(self.config.overfetch_factor.max(1));
        let selected: Vec<Corpus> = request.source.corpora();

        let targets: Vec<(Corpus, Arc<CorpusSnapshot>)> = snapshots
            .iter()
            .filter(|(corpus, _)| selected.contains(corpus))
            .filter_map(|(corpus, snap)| match snap {
                Some(s) if !s.is_empty() => Some((*corpus, s.clone())),
                _ => {
                    debug!(corpus = %corpus, "Corpus unavailable; contributing no candidates");
                    None
                }
            })
            .collect();
        if targets.is_empty() { return Ok(vec![]); }

        let kinds = request.strategy.index_kinds();
        let query_vector = if kinds.contains(&IndexKind::Semantic) { self.embed_query(&request.query).await } else { None };

        let mut tasks = Vec::new();
        for (corpus, snap) in &targets {
            for kind in kinds {
                let snap = snap.clone();
                let corpus = *corpus;
                let kind = *kind;
                let query = request.query.clone();
                let vector = query_vector.clone();
                tasks.push(tokio::task::spawn_blocking(move || {
                    let hits = match kind {
                        IndexKind::Keyword => Ok(snap.keyword_search(&query, fetch)),
                        IndexKind::Semantic => match vector {
                            Some(v) => snap.semantic_search(&v, fetch),
                            None => Ok(vec![]),
                        },
                    };
                    (corpus, kind, hits)
                }));
            }
        }

        let mut lists = Vec::with_capacity(tasks.len());
        for joined in join_all(tasks).await {
            match joined {
                Ok((corpus, kind, Ok(hits))) => {
                    debug!(corpus = %corpus, kind = ?kind, hits = hits.len(), "Candidate list");
                    lists.push(RankedList { corpus, kind, hits });
                }
                Ok((corpus, kind, Err(e))) => warn!(corpus = %corpus, kind = ?kind, error = %e, "Index unavailable for query"),
                Err(e) => warn!(error = %e, "Retrieval task failed"),
            }
        }

        let fused = reciprocal_rank_fusion(&lists, self.config.rrf_k);
        let mut results = Vec::with_capacity(top_k);
        for hit in fused {
            if results.len() == top_k { break; }
            let Some((_, snap)) = targets.iter().find(|(c, _)| *c == hit.corpus) else { continue };
            let Some(meta) = snap.catalog.chunk(&hit.chunk_id) else {
                warn!(chunk = %hit.chunk_id, "Fused hit missing from catalog");
                continue;
            };
            results.push(SearchResult {
                chunk_id: hit.chunk_id,
                document_id: meta.document_id.clone(),
                title: meta.title.clone(),
                snippet: snippet(&meta.text, self.config.snippet_chars),
                source_uri: meta.source_uri.clone(),
                score: hit.score,
                source: hit.corpus,
                rank: results.len() + 1,
                matched_by: hit.matched_by,
            });
        }
        Ok(results)
    }

    /// The query is embedded once and shared by every semantic task. A
    /// failing embedder leaves only the keyword lists.
    async fn embed_query(&self, query: &str) -> Option<Arc<Vec<f32>>> {
        let embedder = self.embedder.clone();
        let text = vec![query.to_string()];
        match tokio::task::spawn_blocking(move || embedder.embed_batch(&text)).await {
            Ok(Ok(mut vectors)) if !vectors.is_empty() => Some(Arc::new(vectors.swap_remove(0))),
            Ok(Ok(_)) => { warn!("Embedder returned no query vector"); None }
            Ok(Err(e)) => { warn!(error = %e, "Query embedding failed"); None }
            Err(e) => { warn!(error = %e, "Query embedding task failed"); None }
        }
    }
}

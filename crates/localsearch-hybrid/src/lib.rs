//! localsearch-hybrid
//!
//! Ties the lexical and vector indexes of each corpus together: corpus
//! indexing with snapshot publication, query routing, and reciprocal rank
//! fusion across corpora. `HybridSearchEngine` is the entry point.
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use localsearch_core::config::EngineConfig;
use localsearch_core::source::{DirectorySource, JsonlSource};
use localsearch_core::{Corpus, CorpusSource, Embedder, Error, Result, SearchResult, SourceSelector, Strategy};

pub mod catalog;
pub mod corpus;
pub mod fusion;
pub mod router;
pub mod snapshot;
pub mod store;

pub use corpus::{BuildReport, CorpusIndexer, OpenOutcome, RefreshReport};
pub use fusion::{reciprocal_rank_fusion, FusedHit, RankedList, RRF_K};
pub use router::{QueryRouter, SearchRequest};
pub use snapshot::CorpusSnapshot;

/// Readiness of one corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusStatus {
    pub corpus: Corpus,
    pub configured: bool,
    pub loaded: bool,
    pub documents: usize,
    pub chunks: usize,
    pub sources: usize,
    pub dimension: Option<usize>,
    pub embedder_id: Option<String>,
    pub generation: Option<u64>,
}

pub struct HybridSearchEngine {
    config: EngineConfig,
    embedder: Arc<dyn Embedder>,
    indexers: BTreeMap<Corpus, Arc<CorpusIndexer>>,
    router: QueryRouter,
}

impl HybridSearchEngine {
    /// Corpora are wired from configuration: the static corpus when enabled
    /// with a source path, the dynamic one when a documents directory is set.
    pub fn new(config: EngineConfig, embedder: Arc<dyn Embedder>) -> Self {
        let router = QueryRouter::new(embedder.clone(), config.query.clone());
        let mut engine = Self { config, embedder, indexers: BTreeMap::new(), router };

        let mut sources: Vec<Arc<dyn CorpusSource>> = Vec::new();
        if let (true, Some(path)) = (engine.config.wikipedia.enabled, engine.config.wikipedia.source.as_ref()) {
            sources.push(Arc::new(JsonlSource::new(path)));
        }
        if let Some(dir) = engine.config.local.docs_dir.as_ref() {
            sources.push(Arc::new(DirectorySource::new(dir, &engine.config.local.extensions)));
        }
        for source in sources {
            let indexer = CorpusIndexer::new(source, engine.embedder.clone(), &engine.config);
            engine.indexers.insert(indexer.corpus(), Arc::new(indexer));
        }
        engine
    }

    /// Register (or replace) the indexer for a corpus.
    pub fn with_corpus(mut self, indexer: CorpusIndexer) -> Self {
        self.indexers.insert(indexer.corpus(), Arc::new(indexer));
        self
    }

    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn indexer(&self, corpus: Corpus) -> Option<&Arc<CorpusIndexer>> { self.indexers.get(&corpus) }

    /// Open every configured corpus concurrently (load, refresh or build).
    /// Both corpora are always driven to completion; the first error, if
    /// any, is returned afterwards.
    pub async fn prepare(&self, cancel: &CancellationToken) -> Result<Vec<(Corpus, OpenOutcome)>> {
        let opened = join_all(self.indexers.keys().map(|corpus| async move { (*corpus, self.open(*corpus, cancel).await) })).await;
        let mut outcomes = Vec::new();
        let mut first_error = None;
        for (corpus, result) in opened {
            match result {
                Ok(outcome) => {
                    info!(corpus = %corpus, ?outcome, "Corpus ready");
                    outcomes.push((corpus, outcome));
                }
                Err(e) => {
                    error!(corpus = %corpus, error = %e, "Corpus failed to open");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error { Some(e) => Err(e), None => Ok(outcomes) }
    }

    /// Load, refresh or build one corpus.
    pub async fn open(&self, corpus: Corpus, cancel: &CancellationToken) -> Result<OpenOutcome> {
        let indexer = self.require(corpus)?;
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || indexer.open(&cancel)).await.map_err(|e| Error::Operation(e.to_string()))?
    }

    /// Publish whatever is persisted, without scanning sources. Corpora with
    /// nothing on disk, or unusable artifacts, stay unloaded.
    pub async fn load_persisted(&self) -> Vec<(Corpus, Result<bool>)> {
        let tasks = self.indexers.values().map(|indexer| {
            let indexer = indexer.clone();
            async move {
                let corpus = indexer.corpus();
                let loaded = tokio::task::spawn_blocking(move || indexer.load().map(|s| s.is_some()))
                    .await
                    .map_err(|e| Error::Operation(e.to_string()))
                    .and_then(|r| r);
                (corpus, loaded)
            }
        });
        join_all(tasks).await
    }

    pub async fn refresh_local(&self, cancel: &CancellationToken) -> Result<RefreshReport> {
        let indexer = self.require(Corpus::Dynamic)?;
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || indexer.refresh(&cancel)).await.map_err(|e| Error::Operation(e.to_string()))?
    }

    pub async fn rebuild(&self, corpus: Corpus, cancel: &CancellationToken) -> Result<BuildReport> {
        let indexer = self.require(corpus)?;
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || indexer.build(&cancel)).await.map_err(|e| Error::Operation(e.to_string()))?
    }

    fn require(&self, corpus: Corpus) -> Result<Arc<CorpusIndexer>> {
        self.indexers.get(&corpus).cloned().ok_or_else(|| Error::IndexUnavailable(format!("{corpus} corpus is not configured")))
    }

    pub async fn execute(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let snapshots: Vec<(Corpus, Option<Arc<CorpusSnapshot>>)> =
            Corpus::ALL.iter().map(|c| (*c, self.indexers.get(c).and_then(|i| i.snapshot()))).collect();
        self.router.execute(request, &snapshots).await
    }

    /// Search with string-typed strategy (`keyword` | `semantic` | `hybrid`)
    /// and source (`all` | `wikipedia` | `local`).
    pub async fn search(&self, query: &str, top_k: i64, strategy: &str, source: &str) -> Result<Vec<SearchResult>> {
        let request = SearchRequest {
            query: query.to_string(),
            top_k,
            strategy: strategy.parse::<Strategy>()?,
            source: source.parse::<SourceSelector>()?,
        };
        self.execute(&request).await
    }

    pub async fn search_wikipedia(&self, query: &str, top_k: i64, strategy: &str) -> Result<Vec<SearchResult>> {
        self.search(query, top_k, strategy, Corpus::Static.label()).await
    }

    pub async fn search_local(&self, query: &str, top_k: i64, strategy: &str) -> Result<Vec<SearchResult>> {
        self.search(query, top_k, strategy, Corpus::Dynamic.label()).await
    }

    pub fn status(&self) -> Vec<CorpusStatus> {
        Corpus::ALL
            .iter()
            .map(|corpus| {
                let snapshot = self.indexers.get(corpus).and_then(|i| i.snapshot());
                CorpusStatus {
                    corpus: *corpus,
                    configured: self.indexers.contains_key(corpus),
                    loaded: snapshot.is_some(),
                    documents: snapshot.as_ref().map_or(0, |s| s.catalog.document_count()),
                    chunks: snapshot.as_ref().map_or(0, |s| s.chunk_count()),
                    sources: snapshot.as_ref().map_or(0, |s| s.catalog.sources.len()),
                    dimension: snapshot.as_ref().map(|s| s.catalog.dimension),
                    embedder_id: snapshot.as_ref().map(|s| s.catalog.embedder_id.clone()),
                    generation: snapshot.as_ref().map(|s| s.generation()),
                }
            })
            .collect()
    }
}

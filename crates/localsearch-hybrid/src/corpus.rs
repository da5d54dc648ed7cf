//! Builds, loads and incrementally refreshes one corpus.
//!
//! All work happens on a private copy of the published snapshot. Only after
//! the copy is complete and persisted is it swapped in; cancellation or any
//! error drops the copy and leaves readers on the previous snapshot.
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use localsearch_core::chunking::Chunker;
use localsearch_core::config::{Bm25Config, EngineConfig, TokenizerConfig};
use localsearch_core::freshness::{diff, ChangeSet};
use localsearch_core::{Chunk, Corpus, CorpusSource, Document, Embedder, Error, Result, SourceEntry};
use localsearch_vector::{hash_content, EmbeddingCache, EmbeddingPipeline};

use crate::snapshot::CorpusSnapshot;
use crate::store::SnapshotStore;

/// Counts from one incremental pass. File counts refer to source entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub added_files: usize,
    pub changed_files: usize,
    pub removed_files: usize,
    pub unchanged_files: usize,
    pub skipped_files: usize,
    pub documents_indexed: usize,
    pub chunks_added: usize,
    pub chunks_removed: usize,
    /// Chunks dropped because identical text was already staged.
    pub duplicate_chunks: usize,
    /// Windows dropped for being shorter than `chunking.min_chunk_chars`.
    pub small_chunks: usize,
    pub embeddings_computed: usize,
    pub embeddings_reused: usize,
    pub generation: u64,
    /// False when nothing changed and the published snapshot was kept.
    pub swapped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub files: usize,
    pub skipped_files: usize,
    pub documents: usize,
    pub chunks: usize,
    pub duplicate_chunks: usize,
    pub small_chunks: usize,
    pub embeddings_computed: usize,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OpenOutcome {
    Loaded { generation: u64 },
    Refreshed(RefreshReport),
    Built(BuildReport),
}

#[derive(Debug, Clone)]
struct IndexerSettings {
    bm25: Bm25Config,
    tokenizer: TokenizerConfig,
    batch_size: usize,
    snippet_chars: usize,
    max_documents: Option<usize>,
    show_progress: bool,
}

pub struct CorpusIndexer {
    corpus: Corpus,
    source: Arc<dyn CorpusSource>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    store: SnapshotStore,
    settings: IndexerSettings,
    current: RwLock<Option<Arc<CorpusSnapshot>>>,
    writer: Mutex<()>,
}

impl CorpusIndexer {
    pub fn new(source: Arc<dyn CorpusSource>, embedder: Arc<dyn Embedder>, config: &EngineConfig) -> Self {
        let corpus = source.corpus();
        // a subset size of 0 means the whole dump
        let max_documents = match corpus {
            Corpus::Static => config.wikipedia.max_documents.filter(|n| *n > 0),
            Corpus::Dynamic => None,
        };
        Self {
            corpus,
            source,
            embedder,
            chunker: Chunker::new(config.chunking.clone()),
            store: SnapshotStore::new(&config.index_dir, corpus),
            settings: IndexerSettings {
                bm25: config.bm25,
                tokenizer: config.tokenizer.clone(),
                batch_size: config.embedding.batch_size,
                snippet_chars: config.query.snippet_chars,
                max_documents,
                show_progress: config.show_progress,
            },
            current: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    pub fn corpus(&self) -> Corpus { self.corpus }
    pub fn store(&self) -> &SnapshotStore { &self.store }

    /// The currently published snapshot, if any. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Option<Arc<CorpusSnapshot>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn publish(&self, snapshot: Arc<CorpusSnapshot>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    fn empty_snapshot(&self) -> CorpusSnapshot {
        CorpusSnapshot::empty(self.corpus, self.settings.bm25, self.settings.tokenizer.clone(), self.embedder.as_ref())
    }

    /// Read persisted artifacts and publish them. `Ok(None)` if nothing was
    /// persisted.
    pub fn load(&self) -> Result<Option<Arc<CorpusSnapshot>>> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(snapshot) = self.store.load(self.corpus, self.embedder.as_ref())? else { return Ok(None) };
        let snapshot = Arc::new(snapshot);
        info!(corpus = %self.corpus, chunks = snapshot.chunk_count(), generation = snapshot.generation(), "Loaded persisted index");
        self.publish(snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Cache-first startup. The static corpus is loaded as is; the dynamic
    /// one is loaded and then brought up to date. Missing or corrupt
    /// artifacts trigger a full build.
    pub fn open(&self, cancel: &CancellationToken) -> Result<OpenOutcome> {
        match self.load() {
            Ok(Some(snapshot)) => match self.corpus {
                Corpus::Static => Ok(OpenOutcome::Loaded { generation: snapshot.generation() }),
                Corpus::Dynamic => self.refresh(cancel).map(OpenOutcome::Refreshed),
            },
            Ok(None) => self.build(cancel).map(OpenOutcome::Built),
            Err(e @ Error::CorruptArtifact { .. }) => {
                warn!(corpus = %self.corpus, error = %e, "Discarding unusable index; rebuilding");
                self.build(cancel).map(OpenOutcome::Built)
            }
            Err(e) => Err(e),
        }
    }

    /// Full scan into a fresh snapshot.
    pub fn build(&self, cancel: &CancellationToken) -> Result<BuildReport> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.snapshot().map_or(0, |s| s.generation()) + 1;
        let base = self.empty_snapshot();
        let listing = self.source.list()?;
        let changes = diff(&listing, &base.catalog.freshness);
        let report = self.apply(base, changes, generation, self.settings.max_documents, cancel)?;
        info!(corpus = %self.corpus, documents = report.documents_indexed, chunks = report.chunks_added, generation, "Built index");
        Ok(BuildReport {
            files: report.added_files,
            skipped_files: report.skipped_files,
            documents: report.documents_indexed,
            chunks: report.chunks_added,
            duplicate_chunks: report.duplicate_chunks,
            small_chunks: report.small_chunks,
            embeddings_computed: report.embeddings_computed,
            generation,
        })
    }

    /// Re-sync with the source: only added, changed and removed entries are
    /// touched. An unchanged source keeps the published snapshot as is.
    pub fn refresh(&self, cancel: &CancellationToken) -> Result<RefreshReport> {
        if self.corpus == Corpus::Static {
            return Err(Error::Validation("the static corpus is rebuilt, not refreshed".into()));
        }
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let listing = self.source.list()?;
        let changes = match current.as_deref() {
            Some(snapshot) => diff(&listing, &snapshot.catalog.freshness),
            None => diff(&listing, &Default::default()),
        };

        if let (true, Some(snapshot)) = (changes.is_empty(), current.as_deref()) {
            info!(corpus = %self.corpus, files = changes.unchanged.len(), "Index up to date");
            return Ok(RefreshReport { unchanged_files: changes.unchanged.len(), generation: snapshot.generation(), ..RefreshReport::default() });
        }
        let base = current.as_deref().cloned().unwrap_or_else(|| self.empty_snapshot());
        let generation = base.generation() + 1;
        let report = self.apply(base, changes, generation, None, cancel)?;
        info!(
            corpus = %self.corpus,
            added = report.added_files, changed = report.changed_files, removed = report.removed_files,
            skipped = report.skipped_files, duplicates = report.duplicate_chunks, chunks_added = report.chunks_added, chunks_removed = report.chunks_removed,
            generation, "Refreshed index"
        );
        Ok(report)
    }

    /// Apply `changes` to `next`, persist it and publish it. Caller holds the
    /// writer lock.
    fn apply(&self, mut next: CorpusSnapshot, changes: ChangeSet, generation: u64, limit: Option<usize>, cancel: &CancellationToken) -> Result<RefreshReport> {
        let mut report = RefreshReport {
            added_files: changes.added.len(),
            changed_files: changes.changed.len(),
            removed_files: changes.removed.len(),
            unchanged_files: changes.unchanged.len(),
            generation,
            ..RefreshReport::default()
        };

        // Reads first: a file that fails to load keeps its old chunks and
        // freshness record and is retried next time.
        let mut staged: Vec<(SourceEntry, Vec<Document>)> = Vec::new();
        let mut remaining = limit;
        for entry in changes.to_index() {
            if cancel.is_cancelled() { return Err(Error::Cancelled); }
            if remaining == Some(0) { break; }
            match self.source.load(entry) {
                Ok(mut docs) => {
                    if let Some(left) = remaining.as_mut() {
                        docs.truncate(*left);
                        *left -= docs.len();
                    }
                    staged.push((entry.clone(), docs));
                }
                Err(e) => {
                    warn!(corpus = %self.corpus, uri = %entry.uri, error = %e, "Skipping unreadable source");
                    report.skipped_files += 1;
                }
            }
        }

        // seeded before removals so edited files can reuse their old vectors
        let mut cache = EmbeddingCache::from_index(&next.vectors, self.embedder.id());
        for uri in &changes.removed {
            report.chunks_removed += next.remove_source(uri);
            next.catalog.freshness.remove(uri);
        }
        for (entry, _) in &staged {
            report.chunks_removed += next.remove_source(&entry.uri);
        }

        // Identical chunk text is embedded and indexed once. The static corpus
        // dedups across the whole build; dynamic files dedup within a document
        // so that removing one file never strands another file's text.
        let mut chunks: Vec<(usize, Chunk)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for (i, (_, docs)) in staged.iter().enumerate() {
            report.documents_indexed += docs.len();
            for doc in docs {
                if self.corpus == Corpus::Dynamic { seen.clear(); }
                let split = self.chunker.split(doc);
                report.small_chunks += split.too_small;
                for chunk in split.chunks {
                    if seen.insert(hash_content(&chunk.text)) {
                        chunks.push((i, chunk));
                    } else {
                        report.duplicate_chunks += 1;
                    }
                }
            }
        }
        if report.duplicate_chunks > 0 {
            debug!(corpus = %self.corpus, duplicates = report.duplicate_chunks, "Dropped duplicate chunks");
        }

        let texts: Vec<String> = chunks.iter().map(|(_, c)| c.text.clone()).collect();
        let outcome = EmbeddingPipeline::new(self.embedder.as_ref(), self.settings.batch_size)
            .with_progress(self.settings.show_progress)
            .run(&texts, &mut cache, cancel)?;
        report.embeddings_computed = outcome.computed;
        report.embeddings_reused = outcome.reused;

        for (((i, chunk), vector), hash) in chunks.iter().zip(outcome.vectors).zip(outcome.hashes) {
            let uri = &staged[*i].0.uri;
            match next.insert_chunk(uri, chunk, vector, hash, self.settings.snippet_chars) {
                Ok(()) => report.chunks_added += 1,
                Err(Error::AlreadyIndexed(id)) => warn!(corpus = %self.corpus, chunk = %id, "Duplicate chunk id; keeping the first"),
                Err(e) => return Err(e),
            }
        }
        if self.corpus == Corpus::Dynamic {
            for (entry, _) in &staged { next.catalog.freshness.insert(entry.uri.clone(), entry.modified_at); }
        }

        if cancel.is_cancelled() { return Err(Error::Cancelled); }
        next.catalog.generation = generation;
        self.store.save(&next)?;
        self.publish(Arc::new(next));
        report.swapped = true;
        Ok(report)
    }
}

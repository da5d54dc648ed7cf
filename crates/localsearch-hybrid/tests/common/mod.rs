#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use localsearch_core::config::EngineConfig;
use localsearch_core::{Corpus, CorpusSource, Document, Embedder, Error, SourceEntry};
use localsearch_embed::HashingEmbedder;
use localsearch_hybrid::CorpusIndexer;

pub fn ts(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).single().expect("valid timestamp") }

pub fn config(index_dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.index_dir = index_dir.to_path_buf();
    config.embedding.provider = "hashing".into();
    config.embedding.dim = 64;
    config.embedding.batch_size = 4;
    config
}

pub fn indexer(source: Arc<dyn CorpusSource>, embedder: Arc<dyn Embedder>, index_dir: &Path) -> CorpusIndexer {
    CorpusIndexer::new(source, embedder, &config(index_dir))
}

/// In-memory corpus with call counters and injectable read failures.
pub struct MemorySource {
    corpus: Corpus,
    files: Mutex<BTreeMap<String, (DateTime<Utc>, String)>>,
    failing: Mutex<BTreeSet<String>>,
    pub list_calls: AtomicUsize,
    pub load_calls: AtomicUsize,
}

impl MemorySource {
    pub fn new(corpus: Corpus) -> Arc<Self> {
        Arc::new(Self {
            corpus,
            files: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(BTreeSet::new()),
            list_calls: AtomicUsize::new(0),
            load_calls: AtomicUsize::new(0),
        })
    }

    pub fn put(&self, uri: &str, secs: i64, body: &str) {
        self.files.lock().unwrap().insert(uri.to_string(), (ts(secs), body.to_string()));
    }

    pub fn remove(&self, uri: &str) { self.files.lock().unwrap().remove(uri); }

    pub fn fail(&self, uri: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing { set.insert(uri.to_string()); } else { set.remove(uri); }
    }

    pub fn loads(&self) -> usize { self.load_calls.load(Ordering::SeqCst) }
    pub fn lists(&self) -> usize { self.list_calls.load(Ordering::SeqCst) }
}

impl CorpusSource for MemorySource {
    fn corpus(&self) -> Corpus { self.corpus }

    fn list(&self) -> localsearch_core::Result<Vec<SourceEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.files.lock().unwrap().iter().map(|(uri, (t, _))| SourceEntry { uri: uri.clone(), modified_at: *t }).collect())
    }

    fn load(&self, entry: &SourceEntry) -> localsearch_core::Result<Vec<Document>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&entry.uri) {
            return Err(Error::io(&entry.uri, std::io::Error::new(std::io::ErrorKind::PermissionDenied, "injected")));
        }
        let files = self.files.lock().unwrap();
        let Some((_, body)) = files.get(&entry.uri) else { return Err(Error::NotFound(entry.uri.clone())) };
        Ok(vec![Document {
            id: format!("mem://{}", entry.uri),
            title: entry.uri.clone(),
            body: body.clone(),
            source_uri: entry.uri.clone(),
            corpus: self.corpus,
            modified_at: Some(entry.modified_at),
            position: None,
        }])
    }
}

/// Counts how many texts were sent for embedding.
pub struct CountingEmbedder {
    inner: Arc<dyn Embedder>,
    pub texts: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>) -> Arc<Self> { Arc::new(Self { inner, texts: AtomicUsize::new(0) }) }
    pub fn hashing(dim: usize) -> Arc<Self> { Self::new(Arc::new(HashingEmbedder::new(dim))) }
    pub fn count(&self) -> usize { self.texts.load(Ordering::SeqCst) }
}

impl Embedder for CountingEmbedder {
    fn id(&self) -> &str { self.inner.id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

/// Embeds text onto four hand-picked concept axes, so semantic relatedness
/// can be asserted without a model: reptiles, programming languages,
/// machine learning and databases.
pub struct ConceptEmbedder;

const AXES: [&[&str]; 4] = [
    &["snake", "snakes", "reptile", "reptiles", "serpent", "python"],
    &["language", "languages", "programming", "code", "python"],
    &["machine", "learning", "neural", "model", "models", "training"],
    &["database", "databases", "sql", "query", "queries", "records", "tables"],
];

impl Embedder for ConceptEmbedder {
    fn id(&self) -> &str { "concept:d4" }
    fn dim(&self) -> usize { AXES.len() }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
                AXES.iter().map(|axis| words.iter().filter(|w| axis.contains(w)).count() as f32).collect()
            })
            .collect())
    }
}

/// Returns vectors one element too long for any text containing `BADDIM`.
pub struct FaultyEmbedder { pub inner: HashingEmbedder }

impl Embedder for FaultyEmbedder {
    fn id(&self) -> &str { self.inner.id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = self.inner.embed_one(t);
                if t.contains("BADDIM") { v.push(0.0); }
                v
            })
            .collect())
    }
}

pub const PYTHON_DOC: &str = "Python is a high-level programming language. Its name is often linked to the snake.";
pub const ML_DOC: &str = "Machine learning builds statistical models from training examples.";
pub const DB_DOC: &str = "Databases store structured records in tables and answer SQL queries.";

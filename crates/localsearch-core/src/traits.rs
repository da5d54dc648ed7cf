use crate::types::{Corpus, Document, SourceEntry};

/// Maps text to fixed-dimension dense vectors.
///
/// Implementations must return vectors of length `dim()` for every input and
/// be deterministic for a given `id()`; the id is recorded in persisted
/// indexes so a provider change is detected at load time.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `bge-m3:d1024`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Enumerates and reads the documents of one corpus.
///
/// `list` is cheap metadata only; `load` performs the actual reads and may
/// return several documents for one entry (e.g. a JSONL dump).
pub trait CorpusSource: Send + Sync {
    fn corpus(&self) -> Corpus;
    fn list(&self) -> crate::Result<Vec<SourceEntry>>;
    fn load(&self, entry: &SourceEntry) -> crate::Result<Vec<Document>>;
}

//! Batched embedding with cache reuse and cooperative cancellation.
//!
//! For each batch we check the cancellation token, consult the cache, embed
//! the misses, validate shape, and write the new vectors through to the cache.
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use localsearch_core::{Embedder, Error, Result};

use crate::cache::{CacheEntry, EmbeddingCache};

pub fn hash_content(s: &str) -> String {
    let h = blake3::hash(s.as_bytes());
    h.to_hex().to_string()
}

/// Vectors aligned with the input texts plus reuse accounting.
#[derive(Debug, Default)]
pub struct EmbedOutcome {
    pub vectors: Vec<Vec<f32>>,
    pub hashes: Vec<String>,
    pub computed: usize,
    pub reused: usize,
}

pub struct EmbeddingPipeline<'a> {
    embedder: &'a dyn Embedder,
    batch_size: usize,
    show_progress: bool,
}

impl<'a> EmbeddingPipeline<'a> {
    pub fn new(embedder: &'a dyn Embedder, batch_size: usize) -> Self {
        Self { embedder, batch_size: batch_size.max(1), show_progress: false }
    }

    pub fn with_progress(mut self, show: bool) -> Self { self.show_progress = show; self }

    pub fn run(&self, texts: &[String], cache: &mut EmbeddingCache, cancel: &CancellationToken) -> Result<EmbedOutcome> {
        let hashes: Vec<String> = texts.iter().map(|t| hash_content(t)).collect();
        let mut vectors: Vec<Vec<f32>> = vec![Vec::new(); texts.len()];
        let mut outcome = EmbedOutcome::default();
        if texts.is_empty() { return Ok(outcome); }

        let pb = if self.show_progress { ProgressBar::new(texts.len() as u64) } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}") {
            pb.set_style(style.progress_chars("#>-"));
        }

        let embedder_id = self.embedder.id().to_string();
        let dim = self.embedder.dim();
        for (batch_no, start) in (0..texts.len()).step_by(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                pb.abandon_with_message("cancelled");
                return Err(Error::Cancelled);
            }
            let end = (start + self.batch_size).min(texts.len());
            let cached = cache.get_many(&hashes[start..end]);

            let mut miss_texts = Vec::new();
            let mut miss_indices = Vec::new();
            for i in start..end {
                match cached.get(&hashes[i]) {
                    Some(v) => { vectors[i] = v.clone(); outcome.reused += 1; }
                    None => { miss_texts.push(texts[i].clone()); miss_indices.push(i); }
                }
            }

            if !miss_texts.is_empty() {
                let embs = self.embedder.embed_batch(&miss_texts).map_err(|e| Error::Embedding(e.to_string()))?;
                if embs.len() != miss_texts.len() {
                    return Err(Error::Embedding(format!("embedder returned {} vectors for {} texts", embs.len(), miss_texts.len())));
                }
                let mut new_entries = Vec::with_capacity(embs.len());
                for (v, &i) in embs.into_iter().zip(miss_indices.iter()) {
                    if v.len() != dim { return Err(Error::DimensionMismatch { expected: dim, actual: v.len() }); }
                    new_entries.push(CacheEntry { content_hash: hashes[i].clone(), embedder_id: embedder_id.clone(), vector: v.clone() });
                    vectors[i] = v;
                }
                outcome.computed += new_entries.len();
                cache.put_many(new_entries);
            }
            pb.set_position(end as u64);
            debug!(batch = batch_no, size = end - start, "Embedded batch");
        }
        pb.finish_and_clear();

        outcome.vectors = vectors;
        outcome.hashes = hashes;
        Ok(outcome)
    }
}

//! In-memory BM25 index over chunks.
//!
//! The forward index (chunk -> term frequencies) is the source of truth and
//! the only thing persisted; inverted postings and length statistics are
//! derived from it on load.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use localsearch_core::config::{Bm25Config, TokenizerConfig};
use localsearch_core::persist::{read_json, write_json_atomic};
use localsearch_core::{Chunk, ChunkId, Error, IndexKind, Result, SearchHit};

use crate::tokenizer::Normalizer;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct ChunkTerms {
	length: u32,
	terms: BTreeMap<String, u32>,
}

#[derive(Serialize, Deserialize)]
struct Bm25Artifact {
	version: u32,
	#[serde(default)]
	generation: u64,
	params: Bm25Config,
	tokenizer: TokenizerConfig,
	chunks: BTreeMap<ChunkId, ChunkTerms>,
}

#[derive(Clone)]
pub struct Bm25Index {
	params: Bm25Config,
	normalizer: Normalizer,
	chunks: BTreeMap<ChunkId, ChunkTerms>,
	postings: HashMap<String, HashMap<ChunkId, u32>>,
	total_length: u64,
}

impl Bm25Index {
	pub fn new(params: Bm25Config, tokenizer: TokenizerConfig) -> Self {
		Self { params, normalizer: Normalizer::new(tokenizer), chunks: BTreeMap::new(), postings: HashMap::new(), total_length: 0 }
	}

	pub fn params(&self) -> Bm25Config { self.params }
	pub fn normalizer(&self) -> &Normalizer { &self.normalizer }
	pub fn len(&self) -> usize { self.chunks.len() }
	pub fn is_empty(&self) -> bool { self.chunks.is_empty() }
	pub fn contains(&self, chunk_id: &str) -> bool { self.chunks.contains_key(chunk_id) }
	pub fn chunk_ids(&self) -> impl Iterator<Item = &ChunkId> { self.chunks.keys() }

	/// Number of chunks containing `token`.
	pub fn document_frequency(&self, token: &str) -> usize { self.postings.get(token).map_or(0, HashMap::len) }

	pub fn average_length(&self) -> f64 {
		if self.chunks.is_empty() { 0.0 } else { self.total_length as f64 / self.chunks.len() as f64 }
	}

	pub fn add_chunk(&mut self, chunk: &Chunk) -> Result<()> { self.add_text(&chunk.id, &chunk.text) }

	pub fn add_text(&mut self, chunk_id: &str, text: &str) -> Result<()> {
		if self.chunks.contains_key(chunk_id) { return Err(Error::AlreadyIndexed(chunk_id.to_string())); }
		let tokens = self.normalizer.normalize(text);
		let mut terms: BTreeMap<String, u32> = BTreeMap::new();
		for token in tokens.iter() { *terms.entry(token.clone()).or_insert(0) += 1; }
		self.insert(chunk_id.to_string(), ChunkTerms { length: tokens.len() as u32, terms });
		Ok(())
	}

	fn insert(&mut self, chunk_id: ChunkId, entry: ChunkTerms) {
		for (term, tf) in &entry.terms {
			self.postings.entry(term.clone()).or_default().insert(chunk_id.clone(), *tf);
		}
		self.total_length += u64::from(entry.length);
		self.chunks.insert(chunk_id, entry);
	}

	pub fn remove_chunk(&mut self, chunk_id: &str) -> Result<()> {
		let entry = self.chunks.remove(chunk_id).ok_or_else(|| Error::NotFound(chunk_id.to_string()))?;
		for term in entry.terms.keys() {
			if let Some(list) = self.postings.get_mut(term) {
				list.remove(chunk_id);
				if list.is_empty() { self.postings.remove(term); }
			}
		}
		self.total_length -= u64::from(entry.length);
		Ok(())
	}

	/// Normalize `query` with the index's own rules, then score.
	pub fn search_text(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
		self.search(&self.normalizer.normalize(query), top_k)
	}

	/// Score every chunk containing at least one query token. Repeated query
	/// tokens count once. Descending score, ties by chunk id.
	pub fn search(&self, query_tokens: &[String], top_k: usize) -> Vec<SearchHit> {
		if top_k == 0 || self.chunks.is_empty() { return vec![]; }
		let n = self.chunks.len() as f64;
		let avgdl = match self.average_length() { l if l > 0.0 => l, _ => 1.0 };
		let k1 = f64::from(self.params.k1);
		let b = f64::from(self.params.b);

		let mut seen = HashSet::new();
		let mut scores: HashMap<&str, f64> = HashMap::new();
		for token in query_tokens {
			if !seen.insert(token.as_str()) { continue; }
			let Some(list) = self.postings.get(token) else { continue };
			let df = list.len() as f64;
			let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
			for (chunk_id, tf) in list {
				let len = self.chunks.get(chunk_id).map_or(0.0, |c| f64::from(c.length));
				let tf = f64::from(*tf);
				let norm = tf + k1 * (1.0 - b + b * len / avgdl);
				*scores.entry(chunk_id.as_str()).or_insert(0.0) += idf * tf * (k1 + 1.0) / norm;
			}
		}

		let mut ranked: Vec<(&str, f64)> = scores.into_iter().collect();
		ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(b.0)));
		ranked.truncate(top_k);
		debug!(tokens = query_tokens.len(), hits = ranked.len(), "bm25 search");
		ranked
			.into_iter()
			.map(|(id, score)| SearchHit { id: id.to_string(), score: score as f32, source: IndexKind::Keyword })
			.collect()
	}

	/// Persist under the snapshot `generation` it belongs to.
	pub fn save(&self, path: &Path, generation: u64) -> Result<()> {
		let artifact = Bm25Artifact {
			version: FORMAT_VERSION,
			generation,
			params: self.params,
			tokenizer: self.normalizer.config().clone(),
			chunks: self.chunks.clone(),
		};
		write_json_atomic(path, &artifact)
	}

	/// The index and the generation it was saved under. `Ok(None)` when
	/// nothing was saved at `path`.
	pub fn load(path: &Path) -> Result<Option<(Self, u64)>> {
		let Some(artifact) = read_json::<Bm25Artifact>(path)? else { return Ok(None) };
		if artifact.version != FORMAT_VERSION {
			return Err(Error::corrupt(path, format!("unsupported format version {}", artifact.version)));
		}
		let mut index = Self::new(artifact.params, artifact.tokenizer);
		for (chunk_id, entry) in artifact.chunks {
			let sum: u64 = entry.terms.values().map(|tf| u64::from(*tf)).sum();
			if sum != u64::from(entry.length) || entry.terms.values().any(|tf| *tf == 0) {
				return Err(Error::corrupt(path, format!("inconsistent term counts for {chunk_id}")));
			}
			index.insert(chunk_id, entry);
		}
		Ok(Some((index, artifact.generation)))
	}
}

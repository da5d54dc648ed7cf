//! Exact cosine-similarity index over chunk embeddings.
//!
//! Every vector shares one dimensionality, fixed at construction or by the
//! first insert. Records carry denormalized title/snippet for display and the
//! content hash used for embedding reuse.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use localsearch_core::persist::{read_json, write_json_atomic};
use localsearch_core::{ChunkId, Error, IndexKind, Result, SearchHit};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingRecord {
	pub vector: Vec<f32>,
	pub title: String,
	pub snippet: String,
	pub content_hash: String,
}

#[derive(Serialize, Deserialize)]
struct VectorArtifact {
	version: u32,
	#[serde(default)]
	generation: u64,
	dim: Option<usize>,
	records: BTreeMap<ChunkId, EmbeddingRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
	dim: Option<usize>,
	records: BTreeMap<ChunkId, EmbeddingRecord>,
}

impl VectorIndex {
	pub fn new() -> Self { Self::default() }
	pub fn with_dim(dim: usize) -> Self { Self { dim: Some(dim), records: BTreeMap::new() } }

	pub fn dim(&self) -> Option<usize> { self.dim }
	pub fn len(&self) -> usize { self.records.len() }
	pub fn is_empty(&self) -> bool { self.records.is_empty() }
	pub fn contains(&self, chunk_id: &str) -> bool { self.records.contains_key(chunk_id) }
	pub fn get(&self, chunk_id: &str) -> Option<&EmbeddingRecord> { self.records.get(chunk_id) }
	pub fn records(&self) -> impl Iterator<Item = (&ChunkId, &EmbeddingRecord)> { self.records.iter() }

	pub fn add_embedding(&mut self, chunk_id: &str, record: EmbeddingRecord) -> Result<()> {
		match self.dim {
			Some(dim) if record.vector.len() != dim => return Err(Error::DimensionMismatch { expected: dim, actual: record.vector.len() }),
			Some(_) => {}
			None => self.dim = Some(record.vector.len()),
		}
		if self.records.contains_key(chunk_id) { return Err(Error::AlreadyIndexed(chunk_id.to_string())); }
		self.records.insert(chunk_id.to_string(), record);
		Ok(())
	}

	pub fn remove_embedding(&mut self, chunk_id: &str) -> Result<EmbeddingRecord> {
		self.records.remove(chunk_id).ok_or_else(|| Error::NotFound(chunk_id.to_string()))
	}

	/// Top `top_k` chunks by cosine similarity, descending, ties by chunk id.
	pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
		if let Some(dim) = self.dim {
			if query.len() != dim { return Err(Error::DimensionMismatch { expected: dim, actual: query.len() }); }
		}
		if top_k == 0 || self.records.is_empty() { return Ok(vec![]); }
		let query_norm = norm(query);
		let mut scored: Vec<(&ChunkId, f32)> = self
			.records
			.iter()
			.map(|(id, rec)| (id, cosine(query, query_norm, &rec.vector)))
			.collect();
		scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(b.0)));
		scored.truncate(top_k);
		Ok(scored.into_iter().map(|(id, score)| SearchHit { id: id.clone(), score, source: IndexKind::Semantic }).collect())
	}

	pub fn save(&self, path: &Path, generation: u64) -> Result<()> {
		write_json_atomic(path, &VectorArtifact { version: FORMAT_VERSION, generation, dim: self.dim, records: self.records.clone() })
	}

	/// The index and the generation it was saved under. `Ok(None)` when
	/// nothing was saved at `path`.
	pub fn load(path: &Path) -> Result<Option<(Self, u64)>> {
		let Some(artifact) = read_json::<VectorArtifact>(path)? else { return Ok(None) };
		if artifact.version != FORMAT_VERSION {
			return Err(Error::corrupt(path, format!("unsupported format version {}", artifact.version)));
		}
		if let Some(dim) = artifact.dim {
			if let Some((id, rec)) = artifact.records.iter().find(|(_, r)| r.vector.len() != dim) {
				return Err(Error::corrupt(path, format!("{id} has {} dimensions, expected {dim}", rec.vector.len())));
			}
		} else if !artifact.records.is_empty() {
			return Err(Error::corrupt(path, "records present without a dimensionality"));
		}
		Ok(Some((Self { dim: artifact.dim, records: artifact.records }, artifact.generation)))
	}
}

fn norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

/// Zero-norm vectors score 0.
fn cosine(query: &[f32], query_norm: f32, v: &[f32]) -> f32 {
	let v_norm = norm(v);
	if query_norm == 0.0 || v_norm == 0.0 { return 0.0; }
	let dot: f32 = query.iter().zip(v).map(|(a, b)| a * b).sum();
	dot / (query_norm * v_norm)
}

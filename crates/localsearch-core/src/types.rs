//! Domain types shared by the text, vector and hybrid engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = String;
pub type DocumentId = String;

/// The two document populations the engine serves.
///
/// `Static` is the large reference snapshot (externally labelled
/// `wikipedia`), `Dynamic` the small personal corpus (`local`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Corpus {
    Static,
    Dynamic,
}

impl Corpus {
    pub const ALL: [Corpus; 2] = [Corpus::Static, Corpus::Dynamic];

    pub fn label(self) -> &'static str {
        match self {
            Corpus::Static => "wikipedia",
            Corpus::Dynamic => "local",
        }
    }
}

impl fmt::Display for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

impl FromStr for Corpus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wikipedia" | "static" => Ok(Corpus::Static),
            "local" | "dynamic" => Ok(Corpus::Dynamic),
            other => Err(Error::Validation(format!("unknown corpus '{other}'"))),
        }
    }
}

/// A unit of retrievable content, as produced by a corpus source.
///
/// - `id`: stable identity derived from the source path or corpus position
/// - `source_uri`: file path or canonical reference URL
/// - `modified_at`: only set for dynamic documents
/// - `position`: position within a larger source file (e.g. a JSONL line)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub body: String,
    pub source_uri: String,
    pub corpus: Corpus,
    pub modified_at: Option<DateTime<Utc>>,
    pub position: Option<usize>,
}

/// A bounded slice of a document; the unit actually indexed and scored.
///
/// `document_id` is a lookup key back to the parent, not ownership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub title: String,
    pub source_uri: String,
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub token_count: usize,
}

impl Chunk {
    pub fn make_id(document_id: &str, chunk_index: usize) -> ChunkId {
        format!("{document_id}#chunk{chunk_index}")
    }
}

/// One entry of a corpus listing: a source file (or dump) and its mtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    pub uri: String,
    pub modified_at: DateTime<Utc>,
}

/// Which sub-index produced a ranked list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Keyword,
    Semantic,
}

/// Retrieval strategy selected per query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Keyword,
    Semantic,
    #[default]
    Hybrid,
}

impl Strategy {
    pub fn index_kinds(self) -> &'static [IndexKind] {
        match self {
            Strategy::Keyword => &[IndexKind::Keyword],
            Strategy::Semantic => &[IndexKind::Semantic],
            Strategy::Hybrid => &[IndexKind::Keyword, IndexKind::Semantic],
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Strategy::Keyword),
            "semantic" => Ok(Strategy::Semantic),
            "hybrid" => Ok(Strategy::Hybrid),
            other => Err(Error::Validation(format!("unknown strategy '{other}'"))),
        }
    }
}

/// Which corpora a query is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceSelector {
    #[default]
    All,
    Only(Corpus),
}

impl SourceSelector {
    pub fn corpora(self) -> Vec<Corpus> {
        match self {
            SourceSelector::All => Corpus::ALL.to_vec(),
            SourceSelector::Only(c) => vec![c],
        }
    }
}

impl FromStr for SourceSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") { return Ok(SourceSelector::All); }
        s.parse::<Corpus>()
            .map(SourceSelector::Only)
            .map_err(|_| Error::Validation(format!("unknown source '{}'", s.trim())))
    }
}

/// A raw hit from a single sub-index. Higher scores are always better.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: IndexKind,
}

/// A fused, rendered result. Produced fresh per query and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub title: String,
    pub snippet: String,
    pub source_uri: String,
    pub score: f32,
    pub source: Corpus,
    pub rank: usize,
    pub matched_by: Vec<IndexKind>,
}

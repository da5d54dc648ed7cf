//! localsearch-text
//!
//! Lexical side of the engine: the shared text normalizer and a BM25 index
//! over chunks that supports incremental adds and removals.
pub mod bm25;
pub mod tokenizer;

pub use bm25::Bm25Index;
pub use tokenizer::{normalize, Normalizer};

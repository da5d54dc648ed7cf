//! localsearch-vector
//!
//! Dense side of the engine: an exact cosine index plus the batched
//! embedding pipeline and content-hash cache that feed it.
pub mod cache;
pub mod embedding;
pub mod index;

pub use cache::{CacheEntry, EmbeddingCache};
pub use embedding::{hash_content, EmbedOutcome, EmbeddingPipeline};
pub use index::{EmbeddingRecord, VectorIndex};

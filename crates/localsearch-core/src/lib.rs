pub mod chunking;
pub mod config;
pub mod error;
pub mod freshness;
pub mod persist;
pub mod source;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{CorpusSource, Embedder};
pub use types::*;

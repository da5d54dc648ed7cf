//! localsearch-embed
//!
//! Embedding providers behind the core `Embedder` trait: the BGE-M3 model on
//! candle, and a hashing embedder for tests and model-less setups.
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use localsearch_core::config::EmbeddingConfig;
use localsearch_core::{Embedder, Error};

pub mod bge;
pub mod hashing;
pub mod pool;
pub mod tokenize;

pub use bge::BgeM3Embedder;
pub use hashing::HashingEmbedder;
pub use pool::mean_pool_normalized;

pub fn get_default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    let provider = if use_fake { "hashing" } else { config.provider.as_str() };
    match provider.to_ascii_lowercase().as_str() {
        "hashing" | "fake" => {
            info!(dim = config.dim, "Using hashing embedder");
            Ok(Arc::new(HashingEmbedder::new(config.dim)))
        }
        "bge-m3" | "bge" => {
            let model_dir = resolve_model_dir(config.model_dir.as_deref())?;
            Ok(Arc::new(BgeM3Embedder::load(&model_dir, config.dim, config.max_len)?))
        }
        other => Err(Error::InvalidConfig(format!("unknown embedding provider '{other}'")).into()),
    }
}

pub fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured { if p.exists() { return Ok(p.to_path_buf()); } }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { info!("Using APP_MODEL_DIR: {}", p.display()); return Ok(p); } }
    if let Ok(dir) = std::env::var("MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { info!("Using MODEL_DIR: {}", p.display()); return Ok(p); } }
    let root = Path::new("../models/bge-m3"); if root.exists() { return Ok(root.to_path_buf()); }
    let legacy = Path::new("models/bge-m3"); if legacy.exists() { return Ok(legacy.to_path_buf()); }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}

//! Configuration loader, typed engine settings and path helpers.
//!
//! Uses Figment to merge typed defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys). The variables understood
//! by earlier deployments (`LOCAL_DOCS_PATH`, `WIKI_SUBSET_SIZE`) are mapped
//! onto their keys. Provides helpers to expand `~` and `${VAR}` and to resolve
//! relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment
            .merge(Env::prefixed("APP_").split("__"))
            .merge(Env::raw().only(&["LOCAL_DOCS_PATH"]).map(|_| "local.docs_dir".into()))
            .merge(Env::raw().only(&["WIKI_SUBSET_SIZE"]).map(|_| "wikipedia.max_documents".into()));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Layer an inline TOML document over the defaults; used by tests and
    /// embedders of the engine that carry their own settings.
    pub fn from_toml_str(toml: &str) -> Self {
        let figment = Figment::from(Serialized::defaults(EngineConfig::default())).merge(Toml::string(toml));
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full engine configuration.
    pub fn engine(&self) -> Result<EngineConfig> {
        let config: EngineConfig = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        if matches!(env, "prod" | "production") {
            let config = self.engine()?;
            if config.embedding.provider == "hashing" {
                anyhow::bail!("the hashing embedder is not allowed in production");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub index_dir: PathBuf,
    pub show_progress: bool,
    pub wikipedia: StaticCorpusConfig,
    pub local: DynamicCorpusConfig,
    pub chunking: ChunkingConfig,
    pub tokenizer: TokenizerConfig,
    pub bm25: Bm25Config,
    pub embedding: EmbeddingConfig,
    pub query: QueryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("data/indexes"),
            show_progress: false,
            wikipedia: StaticCorpusConfig::default(),
            local: DynamicCorpusConfig::default(),
            chunking: ChunkingConfig::default(),
            tokenizer: TokenizerConfig::default(),
            bm25: Bm25Config::default(),
            embedding: EmbeddingConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.max_tokens == 0 { return Err(Error::InvalidConfig("chunking.max_tokens must be > 0".into())); }
        if c.overlap_tokens >= c.max_tokens {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap_tokens ({}) must be smaller than chunking.max_tokens ({})",
                c.overlap_tokens, c.max_tokens
            )));
        }
        let q = &self.query;
        if q.max_top_k == 0 { return Err(Error::InvalidConfig("query.max_top_k must be > 0".into())); }
        if q.overfetch_factor == 0 { return Err(Error::InvalidConfig("query.overfetch_factor must be >= 1".into())); }
        if !(q.rrf_k > 0.0) { return Err(Error::InvalidConfig("query.rrf_k must be > 0".into())); }
        if !(self.bm25.k1 >= 0.0) || !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(Error::InvalidConfig("bm25.k1 must be >= 0 and bm25.b within [0, 1]".into()));
        }
        if self.embedding.batch_size == 0 { return Err(Error::InvalidConfig("embedding.batch_size must be > 0".into())); }
        Ok(())
    }

    /// Expand and resolve every configured path against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.index_dir = resolve_with_base(base, self.index_dir.to_string_lossy());
        if let Some(p) = self.wikipedia.source.take() { self.wikipedia.source = Some(resolve_with_base(base, p.to_string_lossy())); }
        if let Some(p) = self.local.docs_dir.take() { self.local.docs_dir = Some(resolve_with_base(base, p.to_string_lossy())); }
        if let Some(p) = self.embedding.model_dir.take() { self.embedding.model_dir = Some(resolve_with_base(base, p.to_string_lossy())); }
    }
}

/// The large reference corpus, read from a local JSONL dump.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StaticCorpusConfig {
    pub enabled: bool,
    pub source: Option<PathBuf>,
    pub max_documents: Option<usize>,
}

impl Default for StaticCorpusConfig {
    fn default() -> Self { Self { enabled: true, source: None, max_documents: None } }
}

/// The personal corpus: a directory of notes and files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DynamicCorpusConfig {
    pub docs_dir: Option<PathBuf>,
    pub extensions: Vec<String>,
}

impl Default for DynamicCorpusConfig {
    fn default() -> Self {
        Self { docs_dir: None, extensions: vec!["md".to_string(), "txt".to_string(), "py".to_string()] }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    /// Windows shorter than this many characters are dropped, unless that
    /// would leave the document with no chunks at all.
    pub min_chunk_chars: usize,
    /// Start a new window at every `#`, `##` or `###` heading of markdown files.
    pub markdown_sections: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self { Self { max_tokens: 200, overlap_tokens: 40, min_chunk_chars: 100, markdown_sections: true } }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TokenizerConfig {
    pub remove_stop_words: bool,
}

/// BM25 free parameters: term-frequency saturation `k1` and length
/// normalization `b`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self { Self { k1: 1.2, b: 0.75 } }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `bge-m3` or `hashing`.
    pub provider: String,
    pub model_dir: Option<PathBuf>,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { provider: "bge-m3".to_string(), model_dir: None, dim: 1024, max_len: 256, batch_size: 32 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub max_top_k: usize,
    pub overfetch_factor: usize,
    pub rrf_k: f32,
    pub snippet_chars: usize,
}

impl Default for QueryConfig {
    fn default() -> Self { Self { max_top_k: 10, overfetch_factor: 3, rrf_k: 60.0, snippet_chars: 500 } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

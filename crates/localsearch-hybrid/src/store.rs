//! On-disk layout of a corpus snapshot:
//! `<index_dir>/<label>/{lexical,vector,catalog}.json`, each written
//! atomically. The catalog is written last, and every artifact carries the
//! generation it was written for, so a crash between writes is detected.
use std::path::{Path, PathBuf};
use tracing::debug;

use localsearch_core::persist::{read_json, write_json_atomic};
use localsearch_core::{Corpus, Embedder, Error, Result};
use localsearch_text::Bm25Index;
use localsearch_vector::VectorIndex;

use crate::catalog::Catalog;
use crate::snapshot::CorpusSnapshot;

const LEXICAL_FILE: &str = "lexical.json";
const VECTOR_FILE: &str = "vector.json";
const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(index_dir: &Path, corpus: Corpus) -> Self { Self { dir: index_dir.join(corpus.label()) } }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn save(&self, snapshot: &CorpusSnapshot) -> Result<()> {
        let generation = snapshot.generation();
        snapshot.lexical.save(&self.dir.join(LEXICAL_FILE), generation)?;
        snapshot.vectors.save(&self.dir.join(VECTOR_FILE), generation)?;
        write_json_atomic(&self.dir.join(CATALOG_FILE), &snapshot.catalog)?;
        debug!(dir = %self.dir.display(), chunks = snapshot.chunk_count(), "Persisted snapshot");
        Ok(())
    }

    /// `Ok(None)` when nothing was ever persisted. Partial, inconsistent or
    /// foreign-embedder artifacts are `CorruptArtifact`.
    pub fn load(&self, corpus: Corpus, embedder: &dyn Embedder) -> Result<Option<CorpusSnapshot>> {
        let catalog_path = self.dir.join(CATALOG_FILE);
        let lexical_path = self.dir.join(LEXICAL_FILE);
        let vector_path = self.dir.join(VECTOR_FILE);

        let catalog: Option<Catalog> = read_json(&catalog_path)?;
        let lexical = Bm25Index::load(&lexical_path)?;
        let vectors = VectorIndex::load(&vector_path)?;
        let (catalog, (lexical, lexical_generation), (vectors, vector_generation)) = match (catalog, lexical, vectors) {
            (None, None, None) => return Ok(None),
            (Some(c), Some(l), Some(v)) => (c, l, v),
            _ => return Err(Error::corrupt(&self.dir, "incomplete set of index artifacts")),
        };
        for (path, generation) in [(&lexical_path, lexical_generation), (&vector_path, vector_generation)] {
            if generation != catalog.generation {
                return Err(Error::corrupt(path, format!("written for generation {generation}, catalog is at {}", catalog.generation)));
            }
        }

        if catalog.corpus != corpus {
            return Err(Error::corrupt(&catalog_path, format!("built for corpus {}", catalog.corpus)));
        }
        if catalog.embedder_id != embedder.id() || catalog.dimension != embedder.dim() {
            return Err(Error::corrupt(&catalog_path, format!(
                "built with {} (d={}), current embedder is {} (d={})",
                catalog.embedder_id, catalog.dimension, embedder.id(), embedder.dim()
            )));
        }
        if vectors.dim().is_some_and(|d| d != catalog.dimension) {
            return Err(Error::corrupt(&vector_path, "vector dimensionality differs from catalog"));
        }
        let n = catalog.chunks.len();
        if lexical.len() != n || vectors.len() != n {
            return Err(Error::corrupt(&self.dir, format!("chunk counts differ: catalog {n}, lexical {}, vector {}", lexical.len(), vectors.len())));
        }
        if let Some(id) = catalog.chunks.keys().find(|id| !lexical.contains(id) || !vectors.contains(id)) {
            return Err(Error::corrupt(&self.dir, format!("chunk {id} missing from a sub-index")));
        }
        let listed: usize = catalog.sources.values().map(Vec::len).sum();
        if listed != n {
            return Err(Error::corrupt(&catalog_path, "source table does not cover every chunk"));
        }

        Ok(Some(CorpusSnapshot { corpus, lexical, vectors, catalog }))
    }
}

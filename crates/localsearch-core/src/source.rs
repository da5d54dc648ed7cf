//! Corpus sources: a directory of local notes and JSONL reference dumps.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::CorpusSource;
use crate::types::{Corpus, Document, SourceEntry};

/// Files under a root directory, filtered by extension.
///
/// Uris are root-relative paths with `/` separators; document ids are
/// `file://<uri>` and titles the file name.
pub struct DirectorySource {
    root: PathBuf,
    extensions: Vec<String>,
    corpus: Corpus,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, extensions: &[String]) -> Self {
        let extensions = extensions.iter().map(|e| e.trim_start_matches('.').to_ascii_lowercase()).collect();
        Self { root: root.into(), extensions, corpus: Corpus::Dynamic }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn wanted(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

impl CorpusSource for DirectorySource {
    fn corpus(&self) -> Corpus { self.corpus }

    fn list(&self) -> Result<Vec<SourceEntry>> {
        if !self.root.is_dir() {
            warn!(root = %self.root.display(), "Document directory not found; corpus is empty");
            return Ok(vec![]);
        }
        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).follow_links(true) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => { warn!(error = %e, "Skipping unreadable directory entry"); continue; }
            };
            if !entry.file_type().is_file() || !self.wanted(entry.path()) { continue; }
            let modified_at = match entry.metadata().map_err(std::io::Error::from).and_then(|m| m.modified()) {
                Ok(t) => DateTime::<Utc>::from(t),
                Err(e) => { warn!(path = %entry.path().display(), error = %e, "Skipping file without modification time"); continue; }
            };
            entries.push(SourceEntry { uri: relative_uri(&self.root, entry.path()), modified_at });
        }
        entries.sort_by(|a, b| a.uri.cmp(&b.uri));
        debug!(root = %self.root.display(), files = entries.len(), "Listed document directory");
        Ok(entries)
    }

    fn load(&self, entry: &SourceEntry) -> Result<Vec<Document>> {
        let path = self.root.join(&entry.uri);
        let bytes = fs::read(&path).map_err(|e| Error::io(&path, e))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();
        if body.trim().is_empty() {
            return Ok(vec![]);
        }
        let title = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| entry.uri.clone());
        Ok(vec![Document {
            id: format!("file://{}", entry.uri),
            title,
            body,
            source_uri: entry.uri.clone(),
            corpus: self.corpus,
            modified_at: Some(entry.modified_at),
            position: None,
        }])
    }
}

fn relative_uri(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

fn modified_time(path: &Path) -> Result<DateTime<Utc>> {
    let meta = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    meta.modified().map(DateTime::<Utc>::from).map_err(|e| Error::io(path, e))
}

#[derive(Deserialize)]
struct JsonlRecord {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    title: String,
    text: String,
    #[serde(default)]
    url: Option<String>,
}

/// A JSONL article dump (one file, or every `.jsonl` file under a directory).
///
/// Each line is `{"title", "text", "url"?, "id"?}`. Malformed lines are
/// logged and skipped.
pub struct JsonlSource {
    path: PathBuf,
    corpus: Corpus,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into(), corpus: Corpus::Static } }

    fn base(&self) -> &Path {
        if self.path.is_dir() { &self.path } else { self.path.parent().unwrap_or_else(|| Path::new(".")) }
    }
}

impl CorpusSource for JsonlSource {
    fn corpus(&self) -> Corpus { self.corpus }

    fn list(&self) -> Result<Vec<SourceEntry>> {
        if self.path.is_file() {
            return Ok(vec![SourceEntry { uri: relative_uri(self.base(), &self.path), modified_at: modified_time(&self.path)? }]);
        }
        if !self.path.is_dir() {
            warn!(path = %self.path.display(), "Reference dump not found; corpus is empty");
            return Ok(vec![]);
        }
        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(&self.path).follow_links(true) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => { warn!(error = %e, "Skipping unreadable dump entry"); continue; }
            };
            if !entry.file_type().is_file() || entry.path().extension().and_then(|s| s.to_str()) != Some("jsonl") { continue; }
            let modified_at = match modified_time(entry.path()) {
                Ok(t) => t,
                Err(e) => { warn!(path = %entry.path().display(), error = %e, "Skipping dump without modification time"); continue; }
            };
            entries.push(SourceEntry { uri: relative_uri(&self.path, entry.path()), modified_at });
        }
        entries.sort_by(|a, b| a.uri.cmp(&b.uri));
        debug!(path = %self.path.display(), files = entries.len(), "Listed reference dump");
        Ok(entries)
    }

    fn load(&self, entry: &SourceEntry) -> Result<Vec<Document>> {
        let path = self.base().join(&entry.uri);
        let file = fs::File::open(&path).map_err(|e| Error::io(&path, e))?;
        let mut docs = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::io(&path, e))?;
            if line.trim().is_empty() { continue; }
            let record: JsonlRecord = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => { warn!(file = %entry.uri, line = line_no + 1, error = %e, "Skipping malformed record"); continue; }
            };
            if record.text.trim().is_empty() { continue; }

            let position = format!("{}:{}", entry.uri, line_no + 1);
            let id = match record.id {
                Some(serde_json::Value::String(s)) if !s.is_empty() => s,
                Some(serde_json::Value::Number(n)) => n.to_string(),
                _ => record.url.clone().filter(|u| !u.is_empty()).unwrap_or_else(|| position.clone()),
            };
            docs.push(Document {
                id,
                title: record.title,
                body: record.text,
                source_uri: record.url.unwrap_or(position),
                corpus: self.corpus,
                modified_at: None,
                position: Some(line_no),
            });
        }
        Ok(docs)
    }
}

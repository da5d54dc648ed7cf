use std::path::Path;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Document};

/// Splits document bodies into overlapping windows of whitespace tokens.
///
/// Chunk text is sliced from the original body, so inner whitespace and
/// punctuation survive; ids depend only on `(document_id, chunk_index)`.
/// Markdown files are first cut into sections at `#`..`###` headings so a
/// window never straddles two sections.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

/// Chunks kept for one document, plus the windows dropped as too small.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkedDocument {
    pub chunks: Vec<Chunk>,
    pub too_small: usize,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self { Self { config } }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    pub fn chunk(&self, doc: &Document) -> Vec<Chunk> { self.split(doc).chunks }

    pub fn split(&self, doc: &Document) -> ChunkedDocument {
        let spans = word_spans(&doc.body);
        if spans.is_empty() {
            return ChunkedDocument::default();
        }
        let breaks = if self.config.markdown_sections && is_markdown(&doc.source_uri) { heading_offsets(&doc.body) } else { Vec::new() };

        let mut windows = Vec::new();
        for (first, last) in sections(&spans, &breaks) {
            self.window(first, last, &mut windows);
        }

        let text = |(start, end): (usize, usize)| &doc.body[spans[start].0..spans[end - 1].1];
        let min = self.config.min_chunk_chars;
        let kept: Vec<(usize, usize)> = windows.iter().copied().filter(|w| text(*w).chars().count() >= min).collect();
        // a short document still gets its one chunk
        let (kept, too_small) = if kept.is_empty() { (windows, 0) } else { let dropped = windows.len() - kept.len(); (kept, dropped) };

        let total_chunks = kept.len();
        let chunks = kept
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start, end))| Chunk {
                id: Chunk::make_id(&doc.id, chunk_index),
                document_id: doc.id.clone(),
                title: doc.title.clone(),
                source_uri: doc.source_uri.clone(),
                text: text((start, end)).to_string(),
                chunk_index,
                total_chunks,
                token_count: end - start,
            })
            .collect();
        ChunkedDocument { chunks, too_small }
    }

    /// Windows over the span range `first..last`.
    fn window(&self, first: usize, last: usize, out: &mut Vec<(usize, usize)>) {
        let max = self.config.max_tokens.max(1);
        let step = max.saturating_sub(self.config.overlap_tokens).max(1);
        let mut start = first;
        loop {
            let end = (start + max).min(last);
            out.push((start, end));
            if end >= last { break; }
            start += step;
        }
    }
}

fn is_markdown(uri: &str) -> bool {
    Path::new(uri)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
}

/// Byte offsets of the lines that open a section, skipping fenced code.
fn heading_offsets(body: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut fence: Option<&str> = None;
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_start();
        match fence {
            Some(marker) => {
                if trimmed.starts_with(marker) { fence = None; }
            }
            None if trimmed.starts_with("```") => fence = Some("```"),
            None if trimmed.starts_with("~~~") => fence = Some("~~~"),
            None if is_heading(trimmed) => offsets.push(offset),
            None => {}
        }
        offset += line.len();
    }
    offsets
}

/// ATX heading of level 1 to 3.
fn is_heading(line: &str) -> bool {
    let level = line.bytes().take_while(|b| *b == b'#').count();
    (1..=3).contains(&level) && matches!(line.as_bytes().get(level), Some(b' ' | b'\t'))
}

/// Span index ranges between consecutive section breaks. Empty sections
/// are skipped.
fn sections(spans: &[(usize, usize)], breaks: &[usize]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut first = 0;
    let mut next_break = 0;
    for (i, (start, _)) in spans.iter().enumerate() {
        while next_break < breaks.len() && breaks[next_break] <= *start {
            if i > first {
                out.push((first, i));
                first = i;
            }
            next_break += 1;
        }
    }
    out.push((first, spans.len()));
    out
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Byte ranges of whitespace-delimited words.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => { spans.push((s, i)); start = None; }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start { spans.push((s, text.len())); }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Corpus;

    fn doc(body: &str) -> Document {
        Document {
            id: "file://notes/a.md".into(),
            title: "a.md".into(),
            body: body.into(),
            source_uri: "notes/a.md".into(),
            corpus: Corpus::Dynamic,
            modified_at: None,
            position: None,
        }
    }

    #[test]
    fn windows_overlap_and_cover_every_word() {
        let body = (0..10).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunker = Chunker::new(ChunkingConfig { max_tokens: 4, overlap_tokens: 1, ..ChunkingConfig::default() });
        let chunks = chunker.chunk(&doc(&body));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["w0 w1 w2 w3", "w3 w4 w5 w6", "w6 w7 w8 w9"]);
        assert!(chunks.iter().all(|c| c.total_chunks == 3));
        assert_eq!(chunks[2].id, "file://notes/a.md#chunk2");
    }

    #[test]
    fn keeps_original_spacing_inside_a_window() {
        let chunks = Chunker::default().chunk(&doc("  hello,\n\n  world!  "));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello,\n\n  world!");
        assert_eq!(chunks[0].token_count, 2);
    }

    #[test]
    fn whitespace_only_body_has_no_chunks() {
        assert!(Chunker::default().chunk(&doc(" \n\t ")).is_empty());
    }

    #[test]
    fn snippet_truncates_on_characters() {
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("exactly", 7), "exactly");
        assert_eq!(snippet("ünïcode text", 3), "ünï...");
    }

    #[test]
    fn multibyte_words_slice_on_char_boundaries() {
        let chunker = Chunker::new(ChunkingConfig { max_tokens: 1, overlap_tokens: 0, ..ChunkingConfig::default() });
        let chunks = chunker.chunk(&doc("héllo wörld ünïcode"));
        assert_eq!(chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(), vec!["héllo", "wörld", "ünïcode"]);
    }

    fn small(max_tokens: usize, min_chunk_chars: usize) -> Chunker {
        Chunker::new(ChunkingConfig { max_tokens, overlap_tokens: 0, min_chunk_chars, ..ChunkingConfig::default() })
    }

    const SECTIONED: &str = "# Intro\nalpha beta gamma\n## Usage\ndelta epsilon\n#### Detail\nzeta";

    #[test]
    fn markdown_headings_start_new_chunks() {
        let chunks = small(200, 0).chunk(&doc(SECTIONED));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["# Intro\nalpha beta gamma", "## Usage\ndelta epsilon\n#### Detail\nzeta"]);
        assert_eq!(chunks[1].id, "file://notes/a.md#chunk1");
        assert!(chunks.iter().all(|c| c.total_chunks == 2));
    }

    #[test]
    fn headings_only_split_markdown_files() {
        let mut plain = doc(SECTIONED);
        plain.source_uri = "notes/a.txt".into();
        assert_eq!(small(200, 0).chunk(&plain).len(), 1);

        let off = Chunker::new(ChunkingConfig { min_chunk_chars: 0, markdown_sections: false, ..ChunkingConfig::default() });
        assert_eq!(off.chunk(&doc(SECTIONED)).len(), 1);
    }

    #[test]
    fn headings_inside_code_fences_are_ignored() {
        let body = "Setup steps\n```sh\n# install deps\nmake\n```\n~~~\n## still code\n~~~\ndone";
        assert_eq!(small(200, 0).chunk(&doc(body)).len(), 1);
        assert!(is_heading("## Usage"));
        assert!(!is_heading("#hashtag"));
        assert!(!is_heading("#### Deep"));
    }

    #[test]
    fn windows_below_the_minimum_are_dropped() {
        let split = small(4, 15).split(&doc("alphabet bravissimo charlie deltaforce echo"));
        assert_eq!(split.too_small, 1);
        assert_eq!(split.chunks.len(), 1);
        assert_eq!(split.chunks[0].text, "alphabet bravissimo charlie deltaforce");
        assert_eq!(split.chunks[0].total_chunks, 1);
    }

    #[test]
    fn a_short_document_keeps_its_only_chunk() {
        let split = small(200, 100).split(&doc("tiny note"));
        assert_eq!(split.too_small, 0);
        assert_eq!(split.chunks.len(), 1);
        assert_eq!(split.chunks[0].text, "tiny note");
    }
}

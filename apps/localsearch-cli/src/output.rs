//! Terminal and JSON rendering of results and reports.

use serde::Serialize;

use localsearch_core::SearchResult;
use localsearch_hybrid::{CorpusStatus, OpenOutcome};

#[derive(Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    results: &'a [SearchResult],
}

pub fn format_json(query: &str, results: &[SearchResult]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonOutput { query, results })
}

/// One `[Result i]` block per hit, separated by `---` lines.
pub fn format_human(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results found for \"{query}\"");
    }
    results
        .iter()
        .map(|r| {
            let matched: Vec<String> = r.matched_by.iter().map(|k| format!("{k:?}").to_lowercase()).collect();
            format!(
                "[Result {}]\nTitle: {}\nSource: {}\nCorpus: {}\nScore: {:.4} ({})\n{}",
                r.rank,
                r.title,
                r.source_uri,
                r.source,
                r.score,
                matched.join(" + "),
                r.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

pub fn describe_outcome(outcome: &OpenOutcome) -> String {
    match outcome {
        OpenOutcome::Loaded { generation } => format!("loaded persisted index (generation {generation})"),
        OpenOutcome::Built(r) => format!(
            "built {} documents from {} files into {} chunks ({} duplicate, {} too small dropped), {} skipped (generation {})",
            r.documents, r.files, r.chunks, r.duplicate_chunks, r.small_chunks, r.skipped_files, r.generation
        ),
        OpenOutcome::Refreshed(r) if !r.swapped => format!("up to date ({} files)", r.unchanged_files),
        OpenOutcome::Refreshed(r) => format!(
            "+{} added, ~{} changed, -{} removed, {} skipped; {} chunks in, {} out, {} duplicate, {} too small; {} embedded, {} reused (generation {})",
            r.added_files,
            r.changed_files,
            r.removed_files,
            r.skipped_files,
            r.chunks_added,
            r.chunks_removed,
            r.duplicate_chunks,
            r.small_chunks,
            r.embeddings_computed,
            r.embeddings_reused,
            r.generation
        ),
    }
}

pub fn format_status(status: &[CorpusStatus]) -> String {
    status
        .iter()
        .map(|s| match (s.configured, s.loaded) {
            (false, _) => format!("{}: not configured", s.corpus),
            (true, false) => format!("{}: configured, no index on disk", s.corpus),
            (true, true) => format!(
                "{}: {} documents, {} chunks from {} sources; {} d{} (generation {})",
                s.corpus,
                s.documents,
                s.chunks,
                s.sources,
                s.embedder_id.as_deref().unwrap_or("?"),
                s.dimension.unwrap_or(0),
                s.generation.unwrap_or(0)
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use localsearch_core::{Corpus, IndexKind};
    use localsearch_hybrid::{BuildReport, RefreshReport};

    fn result(rank: usize, title: &str) -> SearchResult {
        SearchResult {
            chunk_id: format!("{title}#chunk0"),
            document_id: title.to_string(),
            title: title.to_string(),
            snippet: "some text".into(),
            source_uri: format!("{title}.md"),
            score: 0.0325,
            source: Corpus::Dynamic,
            rank,
            matched_by: vec![IndexKind::Keyword, IndexKind::Semantic],
        }
    }

    #[test]
    fn human_output_separates_result_blocks() {
        let text = format_human("q", &[result(1, "a"), result(2, "b")]);
        assert!(text.starts_with("[Result 1]\nTitle: a\n"));
        assert!(text.contains("\n---\n[Result 2]\n"));
        assert!(text.contains("Corpus: local"));
        assert!(text.contains("(keyword + semantic)"));
        assert_eq!(format_human("q", &[]), "No results found for \"q\"");
    }

    #[test]
    fn outcomes_report_dropped_chunks() {
        let built = OpenOutcome::Built(BuildReport { files: 3, documents: 3, chunks: 2, duplicate_chunks: 1, small_chunks: 4, generation: 1, ..BuildReport::default() });
        assert_eq!(describe_outcome(&built), "built 3 documents from 3 files into 2 chunks (1 duplicate, 4 too small dropped), 0 skipped (generation 1)");

        let refreshed = OpenOutcome::Refreshed(RefreshReport { changed_files: 1, chunks_added: 2, duplicate_chunks: 1, swapped: true, generation: 5, ..RefreshReport::default() });
        assert!(describe_outcome(&refreshed).contains("2 chunks in, 0 out, 1 duplicate, 0 too small;"));

        let idle = OpenOutcome::Refreshed(RefreshReport { unchanged_files: 4, ..RefreshReport::default() });
        assert_eq!(describe_outcome(&idle), "up to date (4 files)");
    }

    #[test]
    fn json_output_carries_the_query() {
        let json: serde_json::Value = serde_json::from_str(&format_json("q", &[result(1, "a")]).unwrap()).unwrap();
        assert_eq!(json["query"], "q");
        assert_eq!(json["results"][0]["rank"], 1);
    }
}

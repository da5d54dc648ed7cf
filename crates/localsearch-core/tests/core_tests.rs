use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs;
use tempfile::TempDir;

use localsearch_core::chunking::Chunker;
use localsearch_core::config::{ChunkingConfig, Config, EngineConfig};
use localsearch_core::freshness::{diff, FreshnessRecords};
use localsearch_core::source::{DirectorySource, JsonlSource};
use localsearch_core::{Corpus, CorpusSource, Error, SourceEntry, SourceSelector, Strategy};

fn ts(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).single().expect("valid timestamp") }

fn entry(uri: &str, secs: i64) -> SourceEntry { SourceEntry { uri: uri.into(), modified_at: ts(secs) } }

#[test]
fn directory_source_lists_wanted_extensions_sorted() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("sub")).unwrap();
    fs::write(dir.join("b.md"), "# Bravo").unwrap();
    fs::write(dir.join("a.txt"), "alpha").unwrap();
    fs::write(dir.join("sub/c.py"), "print('c')").unwrap();
    fs::write(dir.join("image.png"), [0u8, 1, 2]).unwrap();

    let exts = vec!["md".to_string(), "txt".to_string(), "py".to_string()];
    let source = DirectorySource::new(dir, &exts);
    let uris: Vec<String> = source.list().expect("list").into_iter().map(|e| e.uri).collect();
    assert_eq!(uris, vec!["a.txt", "b.md", "sub/c.py"]);
}

#[test]
fn directory_source_loads_ids_titles_and_skips_empty_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("notes")).unwrap();
    fs::write(dir.join("notes/ideas.md"), "rust ownership notes").unwrap();
    fs::write(dir.join("empty.md"), "  \n").unwrap();

    let source = DirectorySource::new(dir, &["md".to_string()]);
    let listing = source.list().unwrap();
    assert_eq!(listing.len(), 2);

    let empty = listing.iter().find(|e| e.uri == "empty.md").unwrap();
    assert!(source.load(empty).unwrap().is_empty());

    let ideas = listing.iter().find(|e| e.uri == "notes/ideas.md").unwrap();
    let docs = source.load(ideas).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "file://notes/ideas.md");
    assert_eq!(docs[0].title, "ideas.md");
    assert_eq!(docs[0].corpus, Corpus::Dynamic);
    assert_eq!(docs[0].modified_at, Some(ideas.modified_at));
}

#[test]
fn directory_source_missing_root_is_empty() {
    let tmp = TempDir::new().unwrap();
    let source = DirectorySource::new(tmp.path().join("nope"), &["md".to_string()]);
    assert!(source.list().unwrap().is_empty());
}

#[test]
fn directory_source_reads_invalid_utf8_lossily() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("latin1.txt"), [b'c', b'a', b'f', 0xE9, b' ', b'o', b'k']).unwrap();
    let source = DirectorySource::new(tmp.path(), &["txt".to_string()]);
    let listing = source.list().unwrap();
    let docs = source.load(&listing[0]).unwrap();
    assert!(docs[0].body.ends_with(" ok"));
}

#[test]
fn directory_source_load_of_vanished_file_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let source = DirectorySource::new(tmp.path(), &["md".to_string()]);
    let err = source.load(&entry("gone.md", 1)).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn jsonl_source_assigns_ids_and_skips_bad_lines() {
    let tmp = TempDir::new().unwrap();
    let dump = tmp.path().join("wiki.jsonl");
    let lines = [
        r#"{"id": "42", "title": "Python", "text": "Python is a programming language.", "url": "https://en.wikipedia.org/wiki/Python"}"#,
        r#"{"title": "Rust", "text": "Rust is a systems language.", "url": "https://en.wikipedia.org/wiki/Rust"}"#,
        "not json at all",
        "",
        r#"{"title": "Anonymous", "text": "No id and no url."}"#,
        r#"{"title": "Blank", "text": "   "}"#,
    ];
    fs::write(&dump, lines.join("\n")).unwrap();

    let source = JsonlSource::new(&dump);
    assert_eq!(source.corpus(), Corpus::Static);
    let listing = source.list().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].uri, "wiki.jsonl");

    let docs = source.load(&listing[0]).unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["42", "https://en.wikipedia.org/wiki/Rust", "wiki.jsonl:5"]);
    assert_eq!(docs[0].source_uri, "https://en.wikipedia.org/wiki/Python");
    assert_eq!(docs[2].position, Some(4));
    assert!(docs.iter().all(|d| d.modified_at.is_none()));
}

#[test]
fn jsonl_directory_lists_dumps_sorted() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("part2")).unwrap();
    fs::write(tmp.path().join("part2/b.jsonl"), "").unwrap();
    fs::write(tmp.path().join("a.jsonl"), "").unwrap();
    fs::write(tmp.path().join("README.txt"), "not a dump").unwrap();

    let uris: Vec<String> = JsonlSource::new(tmp.path()).list().unwrap().into_iter().map(|e| e.uri).collect();
    assert_eq!(uris, vec!["a.jsonl", "part2/b.jsonl"]);
}

#[cfg(unix)]
#[test]
fn jsonl_directory_follows_links_and_skips_dangling_ones() {
    let tmp = TempDir::new().unwrap();
    let dumps = tmp.path().join("dumps");
    fs::create_dir(&dumps).unwrap();
    fs::write(dumps.join("a.jsonl"), r#"{"title": "A", "text": "alpha"}"#).unwrap();
    fs::write(tmp.path().join("elsewhere.jsonl"), r#"{"title": "B", "text": "beta"}"#).unwrap();
    std::os::unix::fs::symlink(tmp.path().join("elsewhere.jsonl"), dumps.join("linked.jsonl")).unwrap();
    std::os::unix::fs::symlink(tmp.path().join("gone.jsonl"), dumps.join("broken.jsonl")).unwrap();

    let listing = JsonlSource::new(&dumps).list().unwrap();
    assert_eq!(listing.iter().map(|e| e.uri.as_str()).collect::<Vec<_>>(), vec!["a.jsonl", "linked.jsonl"]);
}

#[test]
fn chunk_ids_are_stable_across_runs() {
    let tmp = TempDir::new().unwrap();
    let body = (0..450).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
    fs::write(tmp.path().join("long.txt"), &body).unwrap();
    let source = DirectorySource::new(tmp.path(), &["txt".to_string()]);
    let chunker = Chunker::new(ChunkingConfig::default());

    let run = || {
        let listing = source.list().unwrap();
        let docs = source.load(&listing[0]).unwrap();
        chunker.chunk(&docs[0]).into_iter().map(|c| c.id).collect::<Vec<_>>()
    };
    let first = run();
    assert_eq!(first, vec!["file://long.txt#chunk0", "file://long.txt#chunk1", "file://long.txt#chunk2"]);
    assert_eq!(first, run());
}

#[test]
fn diff_classifies_added_changed_removed_unchanged() {
    let mut records = FreshnessRecords::new();
    records.insert("same.md".into(), ts(100));
    records.insert("edited.md".into(), ts(100));
    records.insert("older.md".into(), ts(100));
    records.insert("deleted.md".into(), ts(100));

    let listing = vec![
        entry("same.md", 100),
        entry("new.md", 50),
        entry("edited.md", 101),
        entry("older.md", 90),
    ];
    let set = diff(&listing, &records);
    assert_eq!(set.added.iter().map(|e| e.uri.as_str()).collect::<Vec<_>>(), vec!["new.md"]);
    assert_eq!(set.changed.iter().map(|e| e.uri.as_str()).collect::<Vec<_>>(), vec!["edited.md"]);
    assert_eq!(set.removed, vec!["deleted.md"]);
    assert_eq!(set.unchanged, vec!["older.md", "same.md"]);
    assert!(!set.is_empty());
}

#[test]
fn diff_of_identical_listing_is_empty() {
    let listing = vec![entry("a.md", 10), entry("b.md", 20)];
    let records: FreshnessRecords = listing.iter().map(|e| (e.uri.clone(), e.modified_at)).collect();
    let set = diff(&listing, &records);
    assert!(set.is_empty());
    assert_eq!(set.unchanged.len(), 2);
    let bumped = vec![entry("a.md", 10), SourceEntry { uri: "b.md".into(), modified_at: ts(20) + Duration::seconds(1) }];
    assert_eq!(diff(&bumped, &records).changed.len(), 1);
}

#[test]
fn config_layers_toml_over_defaults() {
    let config = Config::from_toml_str(
        r#"
        index_dir = "/tmp/idx"
        [query]
        max_top_k = 5
        [local]
        docs_dir = "/tmp/notes"
        "#,
    );
    let engine = config.engine().expect("engine config");
    assert_eq!(engine.query.max_top_k, 5);
    assert_eq!(engine.query.rrf_k, 60.0);
    assert_eq!(engine.chunking.max_tokens, 200);
    assert_eq!(engine.local.docs_dir.as_deref(), Some(std::path::Path::new("/tmp/notes")));
    assert_eq!(config.get::<usize>("query.overfetch_factor").unwrap(), 3);
}

#[test]
fn config_rejects_overlap_not_smaller_than_window() {
    let config = Config::from_toml_str("[chunking]\nmax_tokens = 10\noverlap_tokens = 10\n");
    assert!(matches!(config.engine(), Err(Error::InvalidConfig(_))));
}

#[test]
fn resolve_paths_joins_relative_paths_to_base() {
    let mut engine = EngineConfig::default();
    engine.local.docs_dir = Some("notes".into());
    engine.resolve_paths(std::path::Path::new("/srv/app"));
    assert_eq!(engine.index_dir, std::path::Path::new("/srv/app/data/indexes"));
    assert_eq!(engine.local.docs_dir.as_deref(), Some(std::path::Path::new("/srv/app/notes")));
}

#[test]
fn selectors_parse_external_labels() {
    assert_eq!("wikipedia".parse::<SourceSelector>().unwrap(), SourceSelector::Only(Corpus::Static));
    assert_eq!("LOCAL".parse::<SourceSelector>().unwrap(), SourceSelector::Only(Corpus::Dynamic));
    assert_eq!("all".parse::<SourceSelector>().unwrap(), SourceSelector::All);
    assert!(matches!("web".parse::<SourceSelector>(), Err(Error::Validation(_))));
    assert_eq!("hybrid".parse::<Strategy>().unwrap(), Strategy::Hybrid);
    assert!(matches!("fuzzy".parse::<Strategy>(), Err(Error::Validation(_))));
}

//! Integration tests for knowledge-base loading from dataset files.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use vilux_care::config::Config;
use vilux_care::knowledge::KnowledgeLookup;

// ── helpers ──────────────────────────────────────────────────────────────────

const BUILTIN: &str = r#"[
    {"keywords": ["fever"], "response": "builtin fever"},
    {"keywords": ["cough"], "response": "builtin cough"}
]"#;

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("write dataset");
}

fn lookup(dir: &Path) -> KnowledgeLookup {
    KnowledgeLookup::from_config(&Config::test_default(dir).knowledge)
}

// ── tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn builtin_only_when_overlay_missing() {
    let tmp = TempDir::new().expect("tempdir");
    write(tmp.path(), "default-database.json", BUILTIN);

    let kb = lookup(tmp.path());
    assert_eq!(kb.load().await, 2);
    assert_eq!(kb.search("dry cough at night").await.as_deref(), Some("builtin cough"));
}

#[tokio::test]
async fn overlay_entries_shadow_builtin() {
    let tmp = TempDir::new().expect("tempdir");
    write(tmp.path(), "default-database.json", BUILTIN);
    write(
        tmp.path(),
        "user-database.json",
        r#"[{"keywords": ["fever"], "response": "my fever"}, {"keywords": ["rash"], "response": "my rash"}]"#,
    );

    let kb = lookup(tmp.path());
    assert_eq!(kb.load().await, 4);
    assert_eq!(kb.search("a fever").await.as_deref(), Some("my fever"));
    assert_eq!(kb.search("a rash").await.as_deref(), Some("my rash"));
    assert_eq!(kb.search("a cough").await.as_deref(), Some("builtin cough"));
}

#[tokio::test]
async fn malformed_overlay_is_ignored() {
    let tmp = TempDir::new().expect("tempdir");
    write(tmp.path(), "default-database.json", BUILTIN);
    write(tmp.path(), "user-database.json", "{ not json");

    let kb = lookup(tmp.path());
    assert_eq!(kb.load().await, 2);
    assert_eq!(kb.search("fever").await.as_deref(), Some("builtin fever"));
}

#[tokio::test]
async fn missing_builtin_disables_local_answers() {
    let tmp = TempDir::new().expect("tempdir");
    write(tmp.path(), "user-database.json", r#"[{"keywords": ["fever"], "response": "my fever"}]"#);

    let kb = lookup(tmp.path());
    assert_eq!(kb.load().await, 0);
    assert_eq!(kb.search("fever").await, None);
}

#[tokio::test]
async fn loading_twice_reads_sources_once() {
    let tmp = TempDir::new().expect("tempdir");
    write(tmp.path(), "default-database.json", BUILTIN);

    let kb = lookup(tmp.path());
    assert_eq!(kb.load().await, 2);

    // Changes after the first load are not observed and nothing is duplicated.
    write(tmp.path(), "default-database.json", "[]");
    assert_eq!(kb.load().await, 2);
    assert_eq!(kb.loaded_len(), Some(2));
    assert_eq!(kb.search("fever").await.as_deref(), Some("builtin fever"));
}

#[tokio::test]
async fn concurrent_first_lookups_share_one_load() {
    let tmp = TempDir::new().expect("tempdir");
    write(tmp.path(), "default-database.json", BUILTIN);

    let kb = std::sync::Arc::new(lookup(tmp.path()));
    let a = { let kb = kb.clone(); tokio::spawn(async move { kb.search("fever").await }) };
    let b = { let kb = kb.clone(); tokio::spawn(async move { kb.search("cough").await }) };
    assert_eq!(a.await.unwrap().as_deref(), Some("builtin fever"));
    assert_eq!(b.await.unwrap().as_deref(), Some("builtin cough"));
    assert_eq!(kb.loaded_len(), Some(2));
}

#[tokio::test]
async fn shipped_dataset_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/default-database.json");
    let kb = KnowledgeLookup::new(
        vilux_care::knowledge::dataset::DatasetSource::parse(path),
        None,
    );
    assert!(kb.load().await > 0);
    assert!(kb.search("I think I have a fever").await.is_some());
    assert_eq!(kb.search("").await, None);
}

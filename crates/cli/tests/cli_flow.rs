use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

#[allow(deprecated)]
fn docrag(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("docrag").expect("binary");
    cmd.current_dir(workdir)
        .env("DOCRAG_EMBEDDING_MODE", "stub")
        .env_remove("DOCRAG_STORE_DIR")
        .env_remove("DOCRAG_EMBEDDING_MODEL")
        .env_remove("DOCRAG_MODEL_DIR");
    cmd
}

fn run_json(workdir: &Path, args: &[&str]) -> Value {
    let output = docrag(workdir).args(args).output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn setup_docs() -> TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(root.join("data/alpha.txt"), "Alpha beta.").unwrap();
    fs::write(root.join("data/gamma.txt"), "Gamma delta.").unwrap();
    fs::write(root.join("data/blank.txt"), "  \n\n  ").unwrap();
    temp
}

#[test]
fn ingest_then_search_ranks_matching_chunk_first() {
    let temp = setup_docs();
    let root = temp.path();

    let stats = run_json(
        root,
        &["ingest", "data/alpha.txt", "data/gamma.txt", "--json"],
    );
    assert_eq!(stats["documents"], 2);
    assert_eq!(stats["chunks"], 2);
    assert!(root.join("embeddings/chunks.json").exists());
    assert!(root.join("embeddings/index.bin").exists());
    assert!(root.join("embeddings/manifest.json").exists());

    let response = run_json(root, &["search", "alpha", "--json"]);
    assert_eq!(response["query"], "alpha");
    let results = response["results"].as_array().expect("results array");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["rank"], 1);
    assert_eq!(results[0]["text"], "Alpha beta.");
    assert_eq!(results[1]["rank"], 2);

    let status = run_json(root, &["status", "--json"]);
    assert_eq!(status["chunks"], 2);
    assert_eq!(status["vectors"], 2);
    assert_eq!(status["pending"], 0);
    assert_eq!(status["embedding_model"], "stub");
}

#[test]
fn human_search_output_lists_ranks() {
    let temp = setup_docs();
    let root = temp.path();
    run_json(root, &["ingest", "data/alpha.txt", "--json"]);

    docrag(root)
        .args(["search", "alpha", "--top-k", "1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Rank 1: Alpha beta. (Distance: "));
}

#[test]
fn search_on_empty_store_succeeds_with_no_results() {
    let temp = tempdir().unwrap();
    let response = run_json(temp.path(), &["search", "anything", "--json"]);
    assert_eq!(response["results"], serde_json::json!([]));
}

#[test]
fn invalid_query_and_blank_documents_fail() {
    let temp = setup_docs();
    let root = temp.path();

    docrag(root)
        .args(["search", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Query must not be empty"));

    docrag(root)
        .args(["ingest", "data/blank.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No extractable text"));
}

#[test]
fn partial_ingest_commits_good_documents_and_exits_non_zero() {
    let temp = setup_docs();
    let root = temp.path();

    docrag(root)
        .args(["ingest", "data/alpha.txt", "data/blank.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No extractable text"))
        .stderr(predicate::str::contains("1 of 2 documents failed to ingest"));

    let status = run_json(root, &["status", "--json"]);
    assert_eq!(status["chunks"], 1);
    assert_eq!(status["vectors"], 1);
}

#[test]
fn config_file_and_store_dir_flag_are_honoured() {
    let temp = setup_docs();
    let root = temp.path();
    fs::write(
        root.join("docrag.toml"),
        "chunk_size = 10\noverlap = 2\n\n[embedding]\ndimension = 64\n",
    )
    .unwrap();
    fs::write(
        root.join("data/scenario.txt"),
        "Alpha beta. Gamma delta. Epsilon zeta.",
    )
    .unwrap();

    let stats = run_json(
        root,
        &["--store-dir", "kb", "ingest", "data/scenario.txt", "--json"],
    );
    assert_eq!(stats["chunks"], 6);

    let chunks: Vec<String> =
        serde_json::from_str(&fs::read_to_string(root.join("kb/chunks.json")).unwrap()).unwrap();
    assert_eq!(
        chunks,
        vec!["Alpha", "ha beta.", "a. Gamma", "ma delta.", "a. Epsilon", "on zeta."]
    );

    let status = run_json(root, &["--store-dir", "kb", "status", "--json"]);
    assert_eq!(status["dimension"], 64);
}

#[test]
fn reopening_with_different_dimension_is_refused() {
    let temp = setup_docs();
    let root = temp.path();
    run_json(root, &["ingest", "data/alpha.txt", "--json"]);

    fs::write(root.join("docrag.toml"), "[embedding]\ndimension = 32\n").unwrap();
    docrag(root)
        .args(["status", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open store"));
}

//! Integration tests for the ocrbench binary
//!
//! Each test builds a small data folder in a temp directory and runs the
//! real executable against it.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a CLI command
fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ocrbench"))
}

const ASSERTIONS: &str = r#"{"id":"doc1_pg1_present_01","pdf":"doc1.pdf","page":1,"type":"present","text":"Hello World"}
{"id":"doc1_pg1_order_01","pdf":"doc1.pdf","page":1,"type":"order","before":"Section A begins.","after":"Section B begins."}
{"id":"doc1_pg1_present_02","pdf":"doc1.pdf","page":1,"type":"present","text":"A phrase nobody outputs"}
"#;

/// Data folder with one (placeholder) PDF and three candidates.
fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("pdfs")).unwrap();
    fs::write(root.join("pdfs/doc1.pdf"), "placeholder").unwrap();
    fs::write(root.join("set.jsonl"), ASSERTIONS).unwrap();

    write_repeats(root, "good", "Hello World\n\nSection A begins. Section B begins.\n");
    write_repeats(root, "bad", "Goodbye\n\nSection B begins. Section A begins.\n");
    fs::create_dir_all(root.join("empty")).unwrap();
    dir
}

fn write_repeats(root: &Path, candidate: &str, page: &str) {
    let dir = root.join(candidate);
    fs::create_dir_all(&dir).unwrap();
    for repeat in 1..=2 {
        fs::write(dir.join(format!("doc1_pg1_repeat{repeat}.md")), page).unwrap();
    }
}

#[test]
fn test_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Score document OCR pipeline outputs"));
}

#[test]
fn test_missing_pdfs_folder_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("set.jsonl"), ASSERTIONS).unwrap();
    cli()
        .arg("--dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("folder must exist"));
}

#[test]
fn test_missing_assertion_sets_fails() {
    let dir = data_dir();
    fs::remove_file(dir.path().join("set.jsonl")).unwrap();
    cli()
        .arg("--dir")
        .arg(dir.path())
        .arg("--force")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No .jsonl files found"));
}

#[test]
fn test_unreadable_pdf_fails_without_force() {
    let dir = data_dir();
    cli()
        .arg("--dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read PDF"));
}

#[test]
fn test_unknown_candidate_fails() {
    let dir = data_dir();
    cli()
        .arg("--dir")
        .arg(dir.path())
        .arg("--force")
        .arg("--candidate")
        .arg("nobody")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Candidate folder 'nobody' not found"));
}

#[test]
fn test_full_run_with_comparison_and_exports() {
    let dir = data_dir();
    let report = dir.path().join("report.html");

    cli()
        .arg("--dir")
        .arg(dir.path())
        .arg("--force")
        .arg("--quiet")
        .arg("--seed")
        .arg("1")
        .arg("--bootstrap-samples")
        .arg("100")
        .arg("--permutations")
        .arg("100")
        .arg("--compare")
        .arg("good:bad")
        .arg("--test-report")
        .arg(&report)
        .arg("--output-failed")
        .arg("failed.jsonl")
        .assert()
        .success()
        .stdout(predicate::str::contains("Final Summary"))
        .stdout(predicate::str::contains("good vs bad: difference"))
        .stdout(predicate::str::contains("[FAIL]"))
        .stdout(predicate::str::contains("doc1_pg1_present_02"));

    assert!(report.exists());
    let failed = fs::read_to_string(dir.path().join("failed.jsonl")).unwrap();
    assert_eq!(failed.lines().count(), 1);
    assert!(failed.contains("doc1_pg1_present_02"));
}

#[test]
fn test_single_candidate_and_sample() {
    let dir = data_dir();
    cli()
        .arg("--dir")
        .arg(dir.path())
        .arg("--force")
        .arg("--quiet")
        .arg("--candidate")
        .arg("good")
        .arg("--skip-baseline")
        .arg("--sample")
        .arg("1")
        .arg("--seed")
        .arg("4")
        .assert()
        .success()
        .stdout(predicate::str::contains("Randomly sampling 1 assertions out of 3"))
        .stdout(predicate::str::contains("over 1 tests"))
        .stdout(predicate::str::contains("bad").not());
}

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn bin() -> Command {
    let path = assert_cmd::cargo::cargo_bin!("semeval");
    let mut cmd = Command::new(path);
    cmd.env_remove("SEMEVAL_THRESHOLD")
        .env_remove("SEMEVAL_MODEL_ID")
        .env_remove("SEMEVAL_MODEL_DIR")
        .env_remove("RUST_LOG");
    cmd
}

fn write_lines(path: &Path, lines: &[&str]) {
    fs::write(path, lines.join("\n") + "\n").unwrap();
}

fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_lines(
        &dir.path().join("corpus.jsonl"),
        &[
            r#"{"question": "中国的首都是哪里?", "answer": "北京"}"#,
            r#"{"question": "Which animal barks?", "answer": "狗"}"#,
        ],
    );
    write_lines(
        &dir.path().join("predictions.jsonl"),
        &[
            r#"{"prediction": "<think>首都...</think>答案是 **北京**"}"#,
            r#"{"prediction": "猫"}"#,
        ],
    );
    dir
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn scores_corpus_with_lexical_fallback_as_json() {
    let dir = fixture();
    let assert = bin()
        .current_dir(dir.path())
        .args([
            "--no-embedding",
            "--output",
            "json",
            "score",
            "--corpus",
            "corpus.jsonl",
            "--predictions",
            "predictions.jsonl",
            "--extract",
        ])
        .assert()
        .success();

    let json = stdout_json(assert.get_output());
    assert_eq!(json["strategy_used"], "fallback");
    assert_eq!(json["total"], 2);
    assert_eq!(json["correct"], 1);
    assert_eq!(json["accuracy_percent"], 50.0);
    assert_eq!(json["summary"]["accuracy"], 50.0);
    assert_eq!(json["details"][0]["prediction"], "北京");
    assert_eq!(json["details"][0]["is_correct"], true);
    assert_eq!(json["details"][1]["is_correct"], false);
}

#[test]
fn record_missing_fields_aborts_load() {
    let dir = fixture();
    bin()
        .current_dir(dir.path())
        .args([
            "--no-embedding",
            "score",
            "--corpus",
            ".",
            "--predictions",
            "predictions.jsonl",
            "--extract",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required field `question`"));
}

#[test]
fn corpus_directory_is_read_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    fs::create_dir(&corpus).unwrap();
    write_lines(&corpus.join("b.jsonl"), &[r#"{"question": "q2", "answer": "Paris"}"#]);
    write_lines(&corpus.join("a.jsonl"), &[r#"{"question": "q1", "answer": "北京"}"#]);
    fs::write(corpus.join("notes.txt"), "ignored").unwrap();
    let predictions = dir.path().join("predictions.jsonl");
    write_lines(
        &predictions,
        &[r#"{"prediction": "北京"}"#, r#"{"prediction": "paris"}"#],
    );

    let assert = bin()
        .args(["--no-embedding", "--output", "json", "score", "--corpus"])
        .arg(&corpus)
        .arg("--predictions")
        .arg(&predictions)
        .assert()
        .success();

    let json = stdout_json(assert.get_output());
    assert_eq!(json["correct"], 2);
    assert_eq!(json["details"][0]["reference"], "北京");
    assert_eq!(json["details"][1]["reference"], "Paris");
}

#[test]
fn length_mismatch_fails() {
    let dir = fixture();
    write_lines(
        &dir.path().join("short.jsonl"),
        &[r#"{"prediction": "北京"}"#],
    );

    bin()
        .current_dir(dir.path())
        .args([
            "--no-embedding",
            "score",
            "--corpus",
            "corpus.jsonl",
            "--predictions",
            "short.jsonl",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("different length (1 vs 2)"));
}

#[test]
fn malformed_corpus_line_names_file_and_line() {
    let dir = fixture();
    write_lines(
        &dir.path().join("corpus.jsonl"),
        &[r#"{"question": "q", "answer": "a"}"#, "{not json"],
    );

    bin()
        .current_dir(dir.path())
        .args([
            "--no-embedding",
            "score",
            "--corpus",
            "corpus.jsonl",
            "--predictions",
            "predictions.jsonl",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("corpus.jsonl:2"));
}

#[test]
fn below_min_accuracy_exits_with_two() {
    let dir = fixture();
    bin()
        .current_dir(dir.path())
        .args([
            "--no-embedding",
            "score",
            "--corpus",
            "corpus.jsonl",
            "--predictions",
            "predictions.jsonl",
            "--extract",
            "--min-accuracy",
            "75",
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Accuracy:   50.00 %"));
}

#[test]
fn assess_single_pair() {
    let assert = bin()
        .args([
            "--no-embedding",
            "--output",
            "json",
            "assess",
            "--prediction",
            "The capital is Paris",
            "--reference",
            "Paris",
        ])
        .assert()
        .success();

    let json = stdout_json(assert.get_output());
    assert_eq!(json["strategy_used"], "fallback");
    assert_eq!(json["semantic_similarity"], 0.8);
    assert_eq!(json["completeness"], 1.0);
    assert_eq!(json["overall_score"], 0.86);
    assert_eq!(json["is_correct"], true);
}

#[test]
fn hash_model_reports_its_id() {
    let assert = bin()
        .args([
            "--model-id",
            "hash:64",
            "--output",
            "json",
            "assess",
            "--prediction",
            "北京",
            "--reference",
            "北京",
        ])
        .assert()
        .success();

    let json = stdout_json(assert.get_output());
    assert_eq!(json["strategy_used"], "hash:64");
    assert_eq!(json["overall_score"], 1.0);
}

#[test]
fn extract_prints_bold_span() {
    bin()
        .args(["extract", "<think>hmm</think>\nThe answer is **42**."])
        .assert()
        .success()
        .stdout("42\n");
}

#[test]
fn rejects_unknown_output_format() {
    bin()
        .args(["--output", "yaml", "extract", "x"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown output format"));
}

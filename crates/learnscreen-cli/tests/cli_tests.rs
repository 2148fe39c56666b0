//! CLI integration tests using assert_cmd.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn learnscreen() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("learnscreen").unwrap()
}

/// A command run inside `dir` with its data kept under `dir/data`.
fn learnscreen_in(dir: &Path) -> Command {
    let mut cmd = learnscreen();
    cmd.current_dir(dir)
        .env("LEARNSCREEN_DATA_DIR", dir.join("data"))
        .env("HOME", dir);
    cmd
}

const PERFECT_SCRIPT: &str = r#"
user_id = "steady-child"
domain = "numeric_comparison"

[[levels]]
level = 1
trials = [
    { answer = "7", latency_ms = 800 },
    { answer = "9", latency_ms = 700 },
    { answer = "5", latency_ms = 900 },
    { answer = "8", latency_ms = 650 },
    { answer = "10", latency_ms = 720 },
]
"#;

fn save_report(dir: &Path, user: &str) -> PathBuf {
    let output = dir.join("reports").join(user);
    learnscreen_in(dir)
        .args(["report", "--user", user, "--output"])
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Report saved to"));

    let mut files: Vec<PathBuf> = std::fs::read_dir(&output)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    files.pop().unwrap()
}

#[test]
fn validate_letter_set() {
    learnscreen()
        .arg("validate")
        .arg("--questions")
        .arg("../../question-sets/letter-reversals.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Letter reversals (visual_discrimination, 13 questions)",
        ))
        .stdout(predicate::str::contains("All question sets valid"));
}

#[test]
fn validate_directory() {
    learnscreen()
        .arg("validate")
        .arg("--questions")
        .arg("../../question-sets")
        .assert()
        .success()
        .stdout(predicate::str::contains("Letter reversals"))
        .stdout(predicate::str::contains("Bigger number"))
        .stdout(predicate::str::contains("Star tap"))
        .stdout(predicate::str::contains("First words"))
        .stdout(predicate::str::contains("All question sets valid"));
}

#[test]
fn validate_reports_short_levels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.toml");
    std::fs::write(
        &path,
        r#"
[question_set]
name = "Short"
domain = "handwriting"

[[levels]]
level = 1

[[levels.questions]]
kind = "word"
word = "cat"
"#,
    )
    .unwrap();

    learnscreen()
        .arg("validate")
        .arg("--questions")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[level 1] WARNING"))
        .stdout(predicate::str::contains("level is missing"))
        .stdout(predicate::str::contains("3 warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    learnscreen()
        .arg("validate")
        .arg("--questions")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    learnscreen()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created learnscreen.toml"))
        .stdout(predicate::str::contains("Created question-sets/example.toml"))
        .stdout(predicate::str::contains("Created session.toml"));

    assert!(dir.path().join("learnscreen.toml").exists());
    assert!(dir.path().join("question-sets/example.toml").exists());
    assert!(dir.path().join("session.toml").exists());

    learnscreen()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--questions")
        .arg("question-sets/example.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("All question sets valid"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    learnscreen()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    learnscreen()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn simulate_then_profile() {
    let dir = TempDir::new().unwrap();
    learnscreen_in(dir.path()).arg("init").assert().success();

    learnscreen_in(dir.path())
        .args(["simulate", "--script", "session.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3/5"))
        .stdout(predicate::str::contains("Number Comparison: 60.0% over 1 level(s)"));

    assert!(dir
        .path()
        .join("data/demo-child/numeric_comparison.json")
        .exists());

    learnscreen_in(dir.path())
        .args(["profile", "--user", "demo-child", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"user_id\": \"demo-child\""))
        .stdout(predicate::str::contains("\"numeric_comparison\""));

    learnscreen_in(dir.path())
        .args(["profile", "--user", "demo-child"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Number Comparison"))
        .stdout(predicate::str::contains("Overall risk for demo-child"));
}

#[test]
fn simulate_user_override() {
    let dir = TempDir::new().unwrap();
    learnscreen_in(dir.path()).arg("init").assert().success();

    learnscreen_in(dir.path())
        .args(["simulate", "--script", "session.toml", "--user", "other-child"])
        .assert()
        .success();

    assert!(dir
        .path()
        .join("data/other-child/numeric_comparison.json")
        .exists());
    assert!(!dir.path().join("data/demo-child").exists());
}

#[test]
fn simulate_rejects_unknown_domain() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("bad.toml");
    std::fs::write(&script, "user_id = \"x\"\ndomain = \"chess\"\n[[levels]]\nlevel = 1\n").unwrap();

    learnscreen_in(dir.path())
        .arg("simulate")
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown domain: chess"));
}

#[test]
fn simulate_rejects_too_many_trials() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("long.toml");
    let trials = "[[levels.trials]]\nanswer = \"1\"\n".repeat(6);
    std::fs::write(
        &script,
        format!("user_id = \"x\"\ndomain = \"numeric\"\n[[levels]]\nlevel = 1\n{trials}"),
    )
    .unwrap();

    learnscreen_in(dir.path())
        .arg("simulate")
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("has 5 questions"));
}

#[test]
fn profile_for_unknown_child_is_empty() {
    let dir = TempDir::new().unwrap();

    learnscreen_in(dir.path())
        .args(["profile", "--user", "nobody"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No games recorded for nobody"));
}

#[test]
fn profile_rejects_path_like_user() {
    let dir = TempDir::new().unwrap();

    learnscreen_in(dir.path())
        .args(["profile", "--user", "../escape"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn report_without_games_fails() {
    let dir = TempDir::new().unwrap();

    learnscreen_in(dir.path())
        .args(["report", "--user", "nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no games recorded for nobody"));
}

#[test]
fn compare_reports() {
    let dir = TempDir::new().unwrap();
    learnscreen_in(dir.path()).arg("init").assert().success();
    std::fs::write(dir.path().join("perfect.toml"), PERFECT_SCRIPT).unwrap();

    learnscreen_in(dir.path())
        .args(["simulate", "--script", "perfect.toml"])
        .assert()
        .success();
    learnscreen_in(dir.path())
        .args(["simulate", "--script", "session.toml"])
        .assert()
        .success();

    let baseline = save_report(dir.path(), "steady-child");
    let current = save_report(dir.path(), "demo-child");

    learnscreen()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline)
        .arg("--current")
        .arg(&current)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 declines"))
        .stdout(predicate::str::contains("-40.0%"));

    learnscreen()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline)
        .arg("--current")
        .arg(&current)
        .arg("--fail-on-decline")
        .assert()
        .failure();

    learnscreen()
        .arg("compare")
        .arg("--baseline")
        .arg(&current)
        .arg("--current")
        .arg(&current)
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"declines\": []"));
}

#[test]
fn compare_nonexistent_report() {
    learnscreen()
        .arg("compare")
        .arg("--baseline")
        .arg("no_such_file.json")
        .arg("--current")
        .arg("also_no_file.json")
        .assert()
        .failure();
}

#[test]
fn play_rejects_bad_level() {
    let dir = TempDir::new().unwrap();

    learnscreen_in(dir.path())
        .args(["play", "--user", "kid", "--domain", "numeric", "--level", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn play_quits_on_q() {
    let dir = TempDir::new().unwrap();

    learnscreen_in(dir.path())
        .args(["play", "--user", "kid", "--domain", "numeric"])
        .write_stdin("q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Number Comparison for kid"));
}

#[test]
fn help_output() {
    learnscreen()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Learning-difference screening"));
}

#[test]
fn version_output() {
    learnscreen()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("learnscreen"));
}

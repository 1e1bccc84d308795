//! Smoke tests for the `sleuth` binary

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

use sleuth::agent::{ProposedAction, Turn};
use sleuth::{AgentTranscript, GateDecision};

fn sleuth(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sleuth").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
    let path = dir.join("sleuth.toml");
    let transcripts = dir.join("transcripts");
    std::fs::write(
        &path,
        format!(
            "[transcripts]\ndirectory = '{}'\n\n{}",
            transcripts.display(),
            extra
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    sleuth(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("investigate"))
        .stdout(predicate::str::contains("debug"))
        .stdout(predicate::str::contains("transcripts"));
}

#[test]
fn test_config_shows_effective_values() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[agent]\nmax_turns = 7\n\n[debugger]\ncommand_timeout = \"45s\"\n");

    sleuth(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_turns = 7"))
        .stdout(predicate::str::contains("command_timeout = \"45s\""))
        .stdout(predicate::str::contains("[policy]"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[agent]\nmax_turns = 0\n");

    sleuth(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_turns"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    sleuth(dir.path())
        .args(["--config", "does-not-exist.toml", "config"])
        .assert()
        .failure();
}

#[test]
fn test_init_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    sleuth(dir.path()).arg("init").assert().success();

    assert!(dir.path().join(".sleuth/config.toml").exists());
    assert!(dir.path().join(".sleuth/transcripts").is_dir());
}

#[test]
fn test_transcripts_list_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    sleuth(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("transcripts")
        .assert()
        .success()
        .stdout(predicate::str::contains("No transcripts"));

    let mut transcript = AgentTranscript::new("why does it crash", 10);
    transcript.record(
        Turn::new(ProposedAction::Command {
            text: "bt".to_string(),
        })
        .with_decision(GateDecision::Allow)
        .with_execution("bt")
        .with_observation("[no change]\n#0  crash (p=0x0) at crash.c:4"),
    );
    transcript.conclude("null pointer passed to crash()");
    transcript.save(&dir.path().join("transcripts")).unwrap();

    sleuth(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("transcripts")
        .assert()
        .success()
        .stdout(predicate::str::contains(transcript.id.as_str()))
        .stdout(predicate::str::contains("concluded"));

    sleuth(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["show", &transcript.id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Goal: why does it crash"))
        .stdout(predicate::str::contains("crash.c:4"))
        .stdout(predicate::str::contains("null pointer passed to crash()"));

    sleuth(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["show", "no-such-id"])
        .assert()
        .failure();
}

#[test]
fn test_investigate_requires_goal() {
    let dir = tempfile::tempdir().unwrap();
    sleuth(dir.path())
        .args(["investigate", "./a.out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--goal"));
}

//! CLI end-to-end tests
//!
//! Tests for the videoinsight command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the videoinsight binary
#[allow(deprecated)]
fn videoinsight_cmd() -> Command {
    Command::cargo_bin("videoinsight").unwrap()
}

/// Write a config that keeps every file inside `dir`
fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("videoinsight.toml");
    let content = format!(
        r#"
[extensions]
dir = "{plugins}"

[settings]
path = "{settings}"

[jobs]
max_concurrent = 2
"#,
        plugins = dir.join("plugins").display(),
        settings = dir.join("settings.toml").display(),
    );
    fs::write(&path, content).unwrap();
    path
}

fn cmd_in(dir: &Path, config: &Path) -> Command {
    let mut cmd = videoinsight_cmd();
    cmd.current_dir(dir).arg("--config").arg(config);
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    videoinsight_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    videoinsight_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("videoinsight"))
        .stdout(predicate::str::contains("extensions"));
}

#[test]
fn test_cli_version_command() {
    videoinsight_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("videoinsight "));
}

#[test]
fn test_cli_check_tools_command() {
    videoinsight_cmd()
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg").and(predicate::str::contains("ffprobe")));
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    videoinsight_cmd()
        .arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Max concurrent jobs: 2"));
}

#[test]
fn test_cli_validate_rejects_zero_concurrency() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[jobs]\nmax_concurrent = 0\n").unwrap();

    videoinsight_cmd()
        .arg("validate")
        .arg(&config)
        .assert()
        .failure();
}

#[test]
fn test_cli_extension_lifecycle() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    cmd_in(dir.path(), &config)
        .args(["extensions", "install-bundled"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed metatool.ext"));

    cmd_in(dir.path(), &config)
        .args(["extensions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ ] MetaTool (not loaded)"));

    cmd_in(dir.path(), &config)
        .args(["extensions", "enable", "MetaTool"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Enabled 1/1 extensions"));

    let settings = fs::read_to_string(dir.path().join("settings.toml")).unwrap();
    assert!(settings.contains("enabled = \"MetaTool\""));

    cmd_in(dir.path(), &config)
        .args(["extensions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] MetaTool (loaded)"));

    cmd_in(dir.path(), &config)
        .args(["extensions", "disable", "MetaTool"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disabled 1/1 extensions"));

    cmd_in(dir.path(), &config)
        .args(["extensions", "remove", "MetaTool"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1/1 extensions"));
    assert!(!dir.path().join("plugins/metatool.ext").exists());
    assert!(dir.path().join("plugins/__removed__").is_dir());
}

#[test]
fn test_cli_enable_missing_extension_reports_failure() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    cmd_in(dir.path(), &config)
        .args(["extensions", "enable", "Absent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Enabled 0/1 extensions"))
        .stderr(predicate::str::contains("Absent"));
}

#[test]
fn test_cli_run_unknown_command() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    cmd_in(dir.path(), &config)
        .args(["run", "nothing.here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown command"));
}

#[test]
fn test_cli_run_extension_command_needs_selection() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    cmd_in(dir.path(), &config)
        .args(["extensions", "install-bundled"])
        .assert()
        .success();
    cmd_in(dir.path(), &config)
        .args(["extensions", "enable", "MetaTool"])
        .assert()
        .success();

    cmd_in(dir.path(), &config)
        .args(["run", "metatool.clear"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no files selected"));
}

#[test]
fn test_cli_probe_missing_file() {
    videoinsight_cmd()
        .args(["probe", "/nonexistent/clip.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_analyze_without_videos() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let empty = dir.path().join("empty");
    fs::create_dir(&empty).unwrap();
    fs::write(empty.join("notes.txt"), "not a video").unwrap();

    cmd_in(dir.path(), &config)
        .arg("analyze")
        .arg(&empty)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No video files found"));
}

#[test]
fn test_cli_tags_edit_requires_a_field() {
    let dir = tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    fs::write(&clip, b"x").unwrap();

    videoinsight_cmd()
        .args(["tags", "edit"])
        .arg(&clip)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to edit"));
}

#[test]
fn test_cli_run_rejects_malformed_argument() {
    videoinsight_cmd()
        .args(["run", "metatool.edit", "--arg", "title"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key=value"));
}

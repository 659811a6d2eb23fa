//! CLI tests for `solver init` and `solver validate`.
//!
//! Spawns the solver binary and verifies exit codes for valid and invalid
//! inputs. No command here reaches a model endpoint.

use std::process::Command;

use solver::exit_codes;
use solver::io::config::load_config;
use solver::test_support::{SAMPLE_ARCHIVE, TempArchive};

#[test]
fn validate_accepts_sample_archive() {
    let archive = TempArchive::new(SAMPLE_ARCHIVE).expect("archive");
    let output = Command::new(env!("CARGO_BIN_EXE_solver"))
        .arg("validate")
        .arg("--puzzles")
        .arg(archive.path())
        .arg("--config")
        .arg(archive.sibling("missing.toml"))
        .output()
        .expect("solver validate");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok: 2 puzzles");
}

#[test]
fn validate_rejects_short_category() {
    let raw = r#"[{"id": 7, "answers": [
        {"level": 0, "group": "A", "members": ["X", "Y", "Z"]},
        {"level": 1, "group": "B", "members": ["B1", "B2", "B3", "B4"]},
        {"level": 2, "group": "C", "members": ["C1", "C2", "C3", "C4"]},
        {"level": 3, "group": "D", "members": ["D1", "D2", "D3", "D4"]}
    ]}]"#;
    let archive = TempArchive::new(raw).expect("archive");
    let output = Command::new(env!("CARGO_BIN_EXE_solver"))
        .arg("validate")
        .arg("--puzzles")
        .arg(archive.path())
        .arg("--config")
        .arg(archive.sibling("missing.toml"))
        .output()
        .expect("solver validate");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("puzzle 7: category 'A' has 3 members, expected 4"),
        "{stderr}"
    );
}

#[test]
fn validate_rejects_missing_categories() {
    let raw = r#"[{"id": 8, "answers": [
        {"level": 0, "group": "A", "members": ["A1", "A2", "A3", "A4"]},
        {"level": 1, "group": "B", "members": ["B1", "B2", "B3", "B4"]},
        {"level": 2, "group": "C", "members": ["C1", "C2", "C3", "C4"]}
    ]}]"#;
    let archive = TempArchive::new(raw).expect("archive");
    let output = Command::new(env!("CARGO_BIN_EXE_solver"))
        .arg("validate")
        .arg("--puzzles")
        .arg(archive.path())
        .arg("--config")
        .arg(archive.sibling("missing.toml"))
        .output()
        .expect("solver validate");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("schema validation failed"), "{stderr}");
}

#[test]
fn init_writes_default_config_once() {
    let dir = TempArchive::new("[]").expect("temp dir");
    let config = dir.sibling("conf/solver.toml");

    let status = Command::new(env!("CARGO_BIN_EXE_solver"))
        .arg("init")
        .arg("--config")
        .arg(&config)
        .status()
        .expect("solver init");
    assert_eq!(status.code(), Some(exit_codes::OK));
    let loaded = load_config(&config).expect("load written config");
    assert_eq!(loaded.negotiation.max_retries, 15);

    let again = Command::new(env!("CARGO_BIN_EXE_solver"))
        .arg("init")
        .arg("--config")
        .arg(&config)
        .status()
        .expect("solver init again");
    assert_eq!(again.code(), Some(exit_codes::INVALID));
}

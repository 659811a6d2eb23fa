//! Run metadata persistence.
//!
//! Game rows go to the case's SQLite store; each run additionally gets a
//! `meta.json` with the inputs needed to reproduce it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::outcome::Outcome;

/// File name of the per-case evaluation store.
pub const STORE_FILE: &str = "evaluations.db";

/// Input for writing the metadata of a completed run.
#[derive(Debug)]
pub struct MetaInput<'a> {
    pub case_id: &'a str,
    pub case_path: &'a Path,
    pub puzzles_path: &'a Path,
    pub eval_run_id: &'a str,
    pub strategy: &'a str,
    pub seed: u64,
    pub games: usize,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Games that aborted, one message each.
    pub game_errors: Vec<String>,
}

/// Metadata for an eval run, persisted to `meta.json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EvalMeta {
    pub case_id: String,
    pub eval_run_id: String,
    /// SHA-256 of the case file for reproducibility tracking.
    pub case_hash: String,
    /// SHA-256 of the puzzle archive.
    pub puzzles_hash: String,
    pub strategy: String,
    pub seed: u64,
    pub games: usize,
    pub outcome: Option<Outcome>,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
    /// Game failures and non-fatal capture errors.
    pub errors: Vec<String>,
}

/// Write `meta.json` for a run and return the run's results directory.
#[instrument(skip_all, fields(case_id = %input.case_id, eval_run_id = %input.eval_run_id))]
pub fn write_run_meta(base_dir: &Path, input: MetaInput<'_>) -> Result<PathBuf> {
    let results_dir = results_dir(base_dir, input.case_id, input.eval_run_id);
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("create results dir {}", results_dir.display()))?;

    let mut errors = input.game_errors;
    let case_hash = hash_or_note(input.case_path, "case hash", &mut errors);
    let puzzles_hash = hash_or_note(input.puzzles_path, "puzzles hash", &mut errors);
    if !errors.is_empty() {
        warn!(errors = ?errors, "run finished with errors");
    }

    let duration = input.finished_at - input.started_at;
    let meta = EvalMeta {
        case_id: input.case_id.to_string(),
        eval_run_id: input.eval_run_id.to_string(),
        case_hash,
        puzzles_hash,
        strategy: input.strategy.to_string(),
        seed: input.seed,
        games: input.games,
        outcome: Some(input.outcome),
        start_time: input.started_at.to_rfc3339(),
        end_time: input.finished_at.to_rfc3339(),
        duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        errors,
    };
    write_meta(&results_dir.join("meta.json"), &meta)?;
    debug!(results_dir = %results_dir.display(), "run metadata written");
    Ok(results_dir)
}

pub fn results_dir(base_dir: &Path, case_id: &str, eval_run_id: &str) -> PathBuf {
    base_dir.join(case_id).join(eval_run_id)
}

pub fn read_meta(path: &Path) -> Result<EvalMeta> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).context("parse meta")
}

fn write_meta(path: &Path, meta: &EvalMeta) -> Result<()> {
    let contents = serde_json::to_string_pretty(meta).context("serialize meta")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write meta {}", path.display()))?;
    Ok(())
}

fn hash_or_note(path: &Path, label: &str, errors: &mut Vec<String>) -> String {
    match file_sha256(path) {
        Ok(hash) => hash,
        Err(err) => {
            errors.push(format!("{label}: {err}"));
            String::new()
        }
    }
}

fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    let digest = hasher.finalize();
    Ok(hex::encode(digest))
}

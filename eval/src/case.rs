//! Case file parsing and validation.
//!
//! A case names a puzzle archive, which puzzles to play and the solver
//! overrides to play them with. See `eval/cases/` for examples.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use solver::io::config::StrategyKind;

/// A parsed case file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CaseFile {
    pub case: CaseMeta,
    #[serde(default)]
    pub selection: Selection,
    #[serde(default)]
    pub config: CaseConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CaseMeta {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    /// Puzzle archive, relative to the repo root.
    pub puzzles: PathBuf,
    #[serde(default)]
    pub description: Option<String>,
}

/// Which puzzles a run plays.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Selection {
    /// Index of the first archive entry.
    pub start: usize,
    /// Number of games; defaults to the rest of the archive.
    pub count: Option<usize>,
    /// Build each board from categories sampled across the whole archive.
    pub mixed: bool,
    /// Shuffle the presentation order of every board.
    pub shuffle: bool,
    /// Seed for mixing and shuffling. Run `n` of a case uses `seed + n`.
    pub seed: u64,
}

/// Solver overrides for the case.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CaseConfig {
    /// Base `solver.toml`, relative to the repo root. Defaults apply when unset.
    pub solver_config: Option<PathBuf>,
    pub strategy: Option<StrategyKind>,
    pub max_strikes: Option<u32>,
    pub max_retries: Option<u32>,
    pub chain_of_thought: Option<bool>,
}

impl CaseFile {
    /// Load and validate a case file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read case {}", path.display()))?;
        Self::parse_str(&contents).with_context(|| format!("load case {}", path.display()))
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        let case: CaseFile = toml::from_str(contents).context("parse case")?;
        case.validate()?;
        Ok(case)
    }

    fn validate(&self) -> Result<()> {
        validate_case_id(&self.case.id)?;
        if self.case.puzzles.as_os_str().is_empty() {
            bail!("case.puzzles must be non-empty");
        }
        if self.selection.count == Some(0) {
            bail!("selection.count must be > 0");
        }
        if self.config.max_strikes == Some(0) {
            bail!("config.max_strikes must be > 0");
        }
        if self.config.max_retries == Some(0) {
            bail!("config.max_retries must be > 0");
        }
        Ok(())
    }
}

/// Discover and load all case files from a directory.
///
/// Returns cases sorted by id. Errors if duplicate ids are found.
pub fn discover_cases(dir: &Path) -> Result<Vec<CaseFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut cases = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read cases dir {}", dir.display()))? {
        let entry = entry.context("read case entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        cases.push(CaseFile::load(&path)?);
    }
    cases.sort_by(|left, right| left.case.id.cmp(&right.case.id));
    for pair in cases.windows(2) {
        if pair[0].case.id == pair[1].case.id {
            return Err(anyhow!("duplicate case.id {}", pair[0].case.id));
        }
    }
    Ok(cases)
}

fn validate_case_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("case.id must be non-empty");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("case.id must use [a-z0-9_-] only");
    }
    Ok(())
}

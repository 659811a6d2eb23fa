//! Solver configuration stored in `solver.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::metrics::{PENALTY_PER_FAILED_GUESS, POINTS_PER_CORRECT};
use crate::core::puzzle::{DEFAULT_GROUP_SIZE, DEFAULT_MAX_STRIKES, DEFAULT_TOTAL_LEVELS};

/// Endpoint key used when a role has no entry of its own.
pub const DEFAULT_ENDPOINT: &str = "default";

/// Solver configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to the
/// values used for the published evaluation runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SolverConfig {
    pub game: GameConfig,
    pub strategy: StrategyConfig,
    pub negotiation: NegotiationConfig,
    pub rsa: RsaConfig,
    pub direct: DirectConfig,

    /// Chat endpoints by role name, with `default` as the fallback.
    pub endpoints: BTreeMap<String, EndpointConfig>,

    /// Embedding endpoint for category similarity. Scoring is skipped when unset.
    pub embedding: Option<EmbeddingConfig>,

    pub records: RecordsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    /// Categories every archived puzzle must have.
    pub total_levels: usize,
    pub group_size: usize,
    pub max_strikes: u32,
    pub points_per_correct: u32,
    pub penalty_per_failed_guess: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            total_levels: DEFAULT_TOTAL_LEVELS,
            group_size: DEFAULT_GROUP_SIZE,
            max_strikes: DEFAULT_MAX_STRIKES,
            points_per_correct: POINTS_PER_CORRECT,
            penalty_per_failed_guess: PENALTY_PER_FAILED_GUESS,
        }
    }
}

/// Which strategy drives the game.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// One model call per turn.
    Direct,
    /// Speaker/listener pragmatic reranking over all candidate groups.
    Rsa,
    /// Guesser/validator negotiation with snap fallback.
    #[default]
    Negotiation,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Direct => "direct",
            StrategyKind::Rsa => "rsa",
            StrategyKind::Negotiation => "negotiation",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Guesser rounds per turn before falling back.
    pub max_retries: u32,
    /// Consecutive wrong guesses before switching to snap mode.
    pub max_careful_misses: u32,
    /// Consecutive turns without agreement before switching to snap mode.
    pub max_stalled_turns: u32,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_retries: 15,
            max_careful_misses: 3,
            max_stalled_turns: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RsaConfig {
    /// Category descriptions the speaker proposes per candidate.
    pub speaker_samples: usize,
    /// Stop after evaluating this many candidates. Unset evaluates all of them.
    pub max_candidates: Option<usize>,
}

impl Default for RsaConfig {
    fn default() -> Self {
        Self {
            speaker_samples: 3,
            max_candidates: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DirectConfig {
    /// Ask for step-by-step reasoning and replay past mistakes in the prompt.
    pub chain_of_thought: bool,
}

/// OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL, or one of the aliases `oai` / `groq`.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token. No auth header when unset.
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    /// HTTP 429 retries before the call fails.
    pub rate_limit_retries: u32,
    /// Linear backoff step used when the server sends no `Retry-After`.
    pub rate_limit_backoff_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "oai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            temperature: None,
            timeout_secs: 120,
            rate_limit_retries: 5,
            rate_limit_backoff_ms: 2_000,
        }
    }
}

impl EndpointConfig {
    /// Base URL with aliases expanded and no trailing slash.
    pub fn resolved_base_url(&self) -> String {
        resolve_base_url(&self.base_url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "oai".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecordsConfig {
    /// SQLite file receiving one row per finished game.
    pub db_path: Option<PathBuf>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(DEFAULT_ENDPOINT.to_string(), EndpointConfig::default());
        Self {
            game: GameConfig::default(),
            strategy: StrategyConfig::default(),
            negotiation: NegotiationConfig::default(),
            rsa: RsaConfig::default(),
            direct: DirectConfig::default(),
            endpoints,
            embedding: None,
            records: RecordsConfig::default(),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.game.total_levels == 0 {
            return Err(anyhow!("game.total_levels must be > 0"));
        }
        if self.game.group_size == 0 {
            return Err(anyhow!("game.group_size must be > 0"));
        }
        if self.game.max_strikes == 0 {
            return Err(anyhow!("game.max_strikes must be > 0"));
        }
        if self.negotiation.max_retries == 0 {
            return Err(anyhow!("negotiation.max_retries must be > 0"));
        }
        if self.negotiation.max_careful_misses == 0 {
            return Err(anyhow!("negotiation.max_careful_misses must be > 0"));
        }
        if self.negotiation.max_stalled_turns == 0 {
            return Err(anyhow!("negotiation.max_stalled_turns must be > 0"));
        }
        if self.rsa.speaker_samples == 0 {
            return Err(anyhow!("rsa.speaker_samples must be > 0"));
        }
        if self.rsa.max_candidates == Some(0) {
            return Err(anyhow!("rsa.max_candidates must be > 0 when set"));
        }
        if !self.endpoints.contains_key(DEFAULT_ENDPOINT) {
            return Err(anyhow!("endpoints.{DEFAULT_ENDPOINT} must be defined"));
        }
        for (role, endpoint) in &self.endpoints {
            if endpoint.base_url.trim().is_empty() {
                return Err(anyhow!("endpoints.{role}.base_url must be non-empty"));
            }
            if endpoint.model.trim().is_empty() {
                return Err(anyhow!("endpoints.{role}.model must be non-empty"));
            }
            if endpoint.timeout_secs == 0 {
                return Err(anyhow!("endpoints.{role}.timeout_secs must be > 0"));
            }
        }
        if let Some(embedding) = &self.embedding
            && embedding.model.trim().is_empty()
        {
            return Err(anyhow!("embedding.model must be non-empty"));
        }
        Ok(())
    }

    /// Endpoint for `role`, falling back to the `default` entry.
    pub fn endpoint_for(&self, role: &str) -> Result<&EndpointConfig> {
        self.endpoints
            .get(role)
            .or_else(|| self.endpoints.get(DEFAULT_ENDPOINT))
            .ok_or_else(|| anyhow!("no endpoint configured for role '{role}'"))
    }
}

/// Expand the `oai` / `groq` aliases and drop trailing slashes.
pub fn resolve_base_url(base_url: &str) -> String {
    let resolved = match base_url.trim() {
        "oai" => "https://api.openai.com",
        "groq" => "https://api.groq.com/openai",
        other => other,
    };
    resolved.trim_end_matches('/').to_string()
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SolverConfig::default()`.
pub fn load_config(path: &Path) -> Result<SolverConfig> {
    if !path.exists() {
        let cfg = SolverConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SolverConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SolverConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, SolverConfig::default());
        assert_eq!(cfg.negotiation.max_retries, 15);
        assert_eq!(cfg.strategy.kind, StrategyKind::Negotiation);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("solver.toml");
        let mut cfg = SolverConfig::default();
        cfg.endpoints.insert(
            "validator".to_string(),
            EndpointConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
                api_key_env: None,
                temperature: Some(0.5),
                ..EndpointConfig::default()
            },
        );
        cfg.embedding = Some(EmbeddingConfig::default());
        cfg.records.db_path = Some(PathBuf::from("results/evaluations.db"));
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("solver.toml");
        fs::write(
            &path,
            "[strategy]\nkind = \"rsa\"\n\n[rsa]\nspeaker_samples = 5\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.strategy.kind, StrategyKind::Rsa);
        assert_eq!(cfg.rsa.speaker_samples, 5);
        assert_eq!(cfg.game, GameConfig::default());
    }

    #[test]
    fn endpoint_lookup_falls_back_to_default() {
        let mut cfg = SolverConfig::default();
        cfg.endpoints.insert(
            "speaker".to_string(),
            EndpointConfig {
                model: "llama3.2".to_string(),
                ..EndpointConfig::default()
            },
        );
        assert_eq!(cfg.endpoint_for("speaker").expect("speaker").model, "llama3.2");
        assert_eq!(cfg.endpoint_for("guesser").expect("guesser").model, "gpt-4o-mini");
    }

    #[test]
    fn validate_reports_stable_messages() {
        let mut cfg = SolverConfig::default();
        cfg.negotiation.max_retries = 0;
        assert_eq!(
            cfg.validate().unwrap_err().to_string(),
            "negotiation.max_retries must be > 0"
        );

        let mut cfg = SolverConfig::default();
        cfg.endpoints.clear();
        assert_eq!(
            cfg.validate().unwrap_err().to_string(),
            "endpoints.default must be defined"
        );

        let mut cfg = SolverConfig::default();
        cfg.game.total_levels = 0;
        assert_eq!(
            cfg.validate().unwrap_err().to_string(),
            "game.total_levels must be > 0"
        );
    }

    #[test]
    fn resolves_base_url_aliases() {
        assert_eq!(resolve_base_url("oai"), "https://api.openai.com");
        assert_eq!(resolve_base_url("groq"), "https://api.groq.com/openai");
        assert_eq!(
            resolve_base_url("http://localhost:11434/"),
            "http://localhost:11434"
        );
    }
}

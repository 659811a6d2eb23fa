//! Solver configuration merging.
//!
//! Applies case-specific overrides on top of the base solver configuration.

use std::path::Path;

use anyhow::{Context, Result};
use solver::io::config::{SolverConfig, load_config};

use crate::case::CaseConfig;

/// Load the case's base config (or defaults) and apply its overrides.
pub fn resolve_config(repo_root: &Path, overrides: &CaseConfig) -> Result<SolverConfig> {
    let base = match &overrides.solver_config {
        Some(path) => {
            let path = repo_root.join(path);
            load_config(&path).with_context(|| format!("load solver config {}", path.display()))?
        }
        None => SolverConfig::default(),
    };
    apply_case_config(base, overrides)
}

/// Apply case configuration overrides to the base solver config.
pub fn apply_case_config(mut base: SolverConfig, overrides: &CaseConfig) -> Result<SolverConfig> {
    if let Some(strategy) = overrides.strategy {
        base.strategy.kind = strategy;
    }
    if let Some(max_strikes) = overrides.max_strikes {
        base.game.max_strikes = max_strikes;
    }
    if let Some(max_retries) = overrides.max_retries {
        base.negotiation.max_retries = max_retries;
    }
    if let Some(chain_of_thought) = overrides.chain_of_thought {
        base.direct.chain_of_thought = chain_of_thought;
    }
    base.validate()?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solver::io::config::{StrategyKind, write_config};

    #[test]
    fn preserves_base_when_no_override() {
        let base = SolverConfig::default();
        let merged = apply_case_config(base.clone(), &CaseConfig::default()).expect("merge");
        assert_eq!(merged, base);
    }

    #[test]
    fn applies_overrides() {
        let overrides = CaseConfig {
            strategy: Some(StrategyKind::Direct),
            max_strikes: Some(6),
            max_retries: Some(3),
            chain_of_thought: Some(true),
            ..CaseConfig::default()
        };
        let merged = apply_case_config(SolverConfig::default(), &overrides).expect("merge");
        assert_eq!(merged.strategy.kind, StrategyKind::Direct);
        assert_eq!(merged.game.max_strikes, 6);
        assert_eq!(merged.negotiation.max_retries, 3);
        assert!(merged.direct.chain_of_thought);
    }

    #[test]
    fn resolves_base_file_relative_to_repo_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut base = SolverConfig::default();
        base.rsa.speaker_samples = 5;
        write_config(&temp.path().join("solver.toml"), &base).expect("write");

        let overrides = CaseConfig {
            solver_config: Some("solver.toml".into()),
            ..CaseConfig::default()
        };
        let resolved = resolve_config(temp.path(), &overrides).expect("resolve");
        assert_eq!(resolved.rsa.speaker_samples, 5);
    }
}

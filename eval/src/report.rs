use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use solver::io::records::{EvaluationStore, GameRecord};

use crate::outcome::{Outcome, is_solved};
use crate::results::{STORE_FILE, read_meta};

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub runs: usize,
    pub perfect: usize,
    pub solved: usize,
    pub partial: usize,
    pub failed: usize,
    pub error: usize,
    pub avg_duration_secs: Option<f64>,
    pub games: usize,
    /// Percent of games solved without a wrong guess.
    pub perfect_game_pct: Option<f64>,
    pub solve_rate: Option<Stat>,
    pub failed_guesses: Option<Stat>,
    pub hallucinations: Option<Stat>,
    pub points: Option<Stat>,
    pub tokens_generated: Option<Stat>,
    pub tokens_ingested: Option<Stat>,
    pub category_similarity: Option<Stat>,
    /// Solved and total games per strategy.
    pub strategy_solve_rates: BTreeMap<String, (usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stat {
    pub mean: f64,
    pub median: f64,
}

impl Stat {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        Some(Self {
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median,
        })
    }
}

pub fn load_run_dirs(case_results_dir: &Path) -> Result<Vec<PathBuf>> {
    if !case_results_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(case_results_dir)
        .with_context(|| format!("read {}", case_results_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Summarize every run of a case: outcomes from `meta.json`, game statistics
/// from the evaluation store.
pub fn aggregate(case_results_dir: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let mut summary = ReportSummary::default();
    let mut warnings = Vec::new();

    for run_dir in load_run_dirs(case_results_dir)? {
        let meta = match read_meta(&run_dir.join("meta.json")) {
            Ok(meta) => meta,
            Err(err) => {
                warnings.push(format!(
                    "skip {}: meta.json invalid ({err})",
                    run_dir.display()
                ));
                continue;
            }
        };

        summary.runs += 1;
        match meta.outcome {
            Some(Outcome::Perfect) => summary.perfect += 1,
            Some(Outcome::Solved) => summary.solved += 1,
            Some(Outcome::Partial) => summary.partial += 1,
            Some(Outcome::Failed) => summary.failed += 1,
            Some(Outcome::Error) | None => summary.error += 1,
        }

        summary.avg_duration_secs = Some(match summary.avg_duration_secs {
            None => meta.duration_secs,
            Some(avg) => {
                let total = avg * (summary.runs as f64 - 1.0) + meta.duration_secs;
                total / summary.runs as f64
            }
        });
    }

    let store_path = case_results_dir.join(STORE_FILE);
    if store_path.exists() {
        let store = EvaluationStore::open(&store_path)?;
        summarize_games(&mut summary, &store.list(None)?);
    }

    Ok((summary, warnings))
}

fn summarize_games(summary: &mut ReportSummary, games: &[GameRecord]) {
    summary.games = games.len();
    if !games.is_empty() {
        let perfect = games
            .iter()
            .filter(|game| is_solved(game) && game.failed_guesses == 0)
            .count();
        summary.perfect_game_pct = Some(perfect as f64 * 100.0 / games.len() as f64);
    }
    summary.solve_rate = column(games, |game| game.solve_rate);
    summary.failed_guesses = column(games, |game| f64::from(game.failed_guesses));
    summary.hallucinations = column(games, |game| f64::from(game.hallucination_count));
    summary.points = column(games, |game| f64::from(game.points));
    summary.tokens_generated = column(games, |game| game.tokens_generated as f64);
    summary.tokens_ingested = column(games, |game| game.tokens_ingested as f64);
    summary.category_similarity = column(games, |game| game.category_similarity);

    for game in games {
        let entry = summary
            .strategy_solve_rates
            .entry(game.strategy.clone())
            .or_insert((0, 0));
        if is_solved(game) {
            entry.0 += 1;
        }
        entry.1 += 1;
    }
}

fn column(games: &[GameRecord], value: impl Fn(&GameRecord) -> f64) -> Option<Stat> {
    Stat::of(&games.iter().map(value).collect::<Vec<_>>())
}

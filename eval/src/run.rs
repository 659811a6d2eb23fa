//! Case execution orchestration.
//!
//! Expands a case into games, plays each with the configured strategy and
//! records one row per game plus the run's `meta.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use solver::agents::ResponderFactory;
use solver::core::metrics::Metrics;
use solver::core::puzzle::PuzzleState;
use solver::io::config::SolverConfig;
use solver::io::puzzle_source::load_puzzles;
use solver::io::records::{EvaluationStore, GameRecord};
use solver::play::play_configured;
use solver::scoring::CategoryScorer;
use tracing::{debug, info, instrument, warn};

use crate::case::CaseFile;
use crate::outcome::{Outcome, classify_outcome};
use crate::results::{MetaInput, STORE_FILE, write_run_meta};
use crate::sampling::{GamePlan, plan_games};

/// Result of running a single case.
#[derive(Debug)]
pub struct RunOutcome {
    /// Unique identifier for this eval run.
    pub eval_run_id: String,
    /// Path to the results directory.
    pub results_dir: PathBuf,
    /// Records of the games that finished.
    pub games: Vec<GameRecord>,
    pub outcome: Outcome,
}

/// Everything a run needs besides the case itself.
pub struct RunContext<'a> {
    pub repo_root: &'a Path,
    pub config: &'a SolverConfig,
    pub responders: &'a dyn ResponderFactory,
    pub scorer: Option<&'a CategoryScorer>,
}

/// Play every game of run number `run_index` and capture the results.
#[instrument(skip_all, fields(case_id = %case.case.id, run_index))]
pub fn run_case(
    ctx: &RunContext<'_>,
    case_path: &Path,
    case: &CaseFile,
    run_index: u32,
) -> Result<RunOutcome> {
    info!("case run started");
    let puzzles_path = ctx.repo_root.join(&case.case.puzzles);
    let puzzles = load_puzzles(&puzzles_path, &ctx.config.game)
        .with_context(|| format!("load puzzles for case {}", case.case.id))?;
    let plans = plan_games(&puzzles, &case.selection, run_index).context("plan games")?;
    debug!(games = plans.len(), "games planned");

    let started_at = Utc::now();
    let eval_run_id = format!("eval-{}-r{run_index}", started_at.format("%Y%m%d_%H%M%S"));
    let case_results = ctx.repo_root.join("eval").join("results");
    let store = EvaluationStore::open(&case_results.join(&case.case.id).join(STORE_FILE))?;
    let strategy = ctx.config.strategy.kind.as_str();

    let mut games = Vec::with_capacity(plans.len());
    let mut errors = Vec::new();
    for plan in &plans {
        match play_plan(ctx, plan) {
            Ok(metrics) => {
                let record = GameRecord::from_metrics(
                    &metrics,
                    &eval_run_id,
                    &plan.label,
                    strategy,
                    Utc::now(),
                );
                store.insert(&record).context("record game")?;
                games.push(record);
            }
            Err(err) => {
                warn!(puzzle = %plan.label, error = %format!("{err:#}"), "game aborted");
                errors.push(format!("{}: {err:#}", plan.label));
            }
        }
    }
    let finished_at = Utc::now();

    let outcome = classify_outcome(&games, errors.len());
    let results_dir = write_run_meta(
        &case_results,
        MetaInput {
            case_id: &case.case.id,
            case_path,
            puzzles_path: &puzzles_path,
            eval_run_id: &eval_run_id,
            strategy,
            seed: case.selection.seed.wrapping_add(u64::from(run_index)),
            games: games.len(),
            outcome,
            started_at,
            finished_at,
            game_errors: errors,
        },
    )
    .context("write run meta")?;

    info!(outcome = ?outcome, results_dir = %results_dir.display(), "case run complete");
    Ok(RunOutcome {
        eval_run_id,
        results_dir,
        games,
        outcome,
    })
}

fn play_plan(ctx: &RunContext<'_>, plan: &GamePlan) -> Result<Metrics> {
    let game = &ctx.config.game;
    let mut puzzle = PuzzleState::new(plan.categories.clone(), game.group_size, game.max_strikes)?;
    if let Some(order) = &plan.board_order {
        puzzle.set_board_order(order.clone())?;
    }
    let outcome = play_configured(&mut puzzle, ctx.config, ctx.responders, ctx.scorer, |turn| {
        debug!(puzzle = %plan.label, turn = turn.turn, result = ?turn.result, "turn");
    })?;
    Ok(outcome.metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::read_meta;
    use solver::io::config::StrategyKind;
    use solver::test_support::{SAMPLE_ARCHIVE, ScriptedResponders};
    use std::fs;

    const SOLVE_FIRST: [&str; 4] = [
        "Group: HAIL, RAIN, SLEET, SNOW\nCategory: WET WEATHER",
        "Group: BUCKS, HEAT, JAZZ, NETS\nCategory: NBA TEAMS",
        "Group: OPTION, RETURN, SHIFT, TAB\nCategory: KEYBOARD KEYS",
        "Group: KAYAK, LEVEL, MOM, RACECAR\nCategory: PALINDROMES",
    ];

    const SOLVE_SECOND: [&str; 4] = [
        "Group: BOA, MAMBA, PYTHON, VIPER\nCategory: SNAKES",
        "Group: BOOT, CLOG, LOAFER, SANDAL\nCategory: FOOTWEAR",
        "Group: FOOT, INCH, MILE, YARD\nCategory: UNITS OF LENGTH",
        "Group: ADAMS, CANDY, LENNON, WAYNE\nCategory: FAMOUS JOHNS",
    ];

    fn setup() -> (tempfile::TempDir, PathBuf, CaseFile) {
        let temp = tempfile::tempdir().expect("tempdir");
        let puzzles = temp.path().join("eval/puzzles/sample.json");
        fs::create_dir_all(puzzles.parent().expect("parent")).expect("mkdir");
        fs::write(&puzzles, SAMPLE_ARCHIVE).expect("write archive");
        let case_path = temp.path().join("eval/cases/direct.toml");
        let contents = "[case]\nid = \"direct\"\npuzzles = \"eval/puzzles/sample.json\"\n";
        fs::create_dir_all(case_path.parent().expect("parent")).expect("mkdir");
        fs::write(&case_path, contents).expect("write case");
        let case = CaseFile::load(&case_path).expect("case");
        (temp, case_path, case)
    }

    fn direct_config() -> SolverConfig {
        let mut config = SolverConfig::default();
        config.strategy.kind = StrategyKind::Direct;
        config
    }

    #[test]
    fn plays_every_game_and_records_them() {
        let (temp, case_path, case) = setup();
        let replies: Vec<&str> = SOLVE_FIRST.iter().chain(&SOLVE_SECOND).copied().collect();
        let responders = ScriptedResponders::default().with("direct", &replies);
        let config = direct_config();
        let ctx = RunContext {
            repo_root: temp.path(),
            config: &config,
            responders: &responders,
            scorer: None,
        };

        let outcome = run_case(&ctx, &case_path, &case, 0).expect("run");
        assert_eq!(outcome.outcome, Outcome::Perfect);
        assert_eq!(outcome.games.len(), 2);
        assert!(outcome.eval_run_id.ends_with("-r0"));

        let store =
            EvaluationStore::open(&temp.path().join("eval/results/direct").join(STORE_FILE))
                .expect("store");
        let stored = store.list(Some(&outcome.eval_run_id)).expect("list");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].puzzle_id, "1-2023-06-13");
        assert_eq!(stored[1].strategy, "direct");

        let meta = read_meta(&outcome.results_dir.join("meta.json")).expect("meta");
        assert_eq!(meta.games, 2);
        assert!(meta.errors.is_empty());
        assert_eq!(meta.case_id, "direct");
    }

    #[test]
    fn aborted_game_marks_run_as_error() {
        let (temp, case_path, case) = setup();
        let responders = ScriptedResponders::default().with("direct", &SOLVE_FIRST);
        let config = direct_config();
        let ctx = RunContext {
            repo_root: temp.path(),
            config: &config,
            responders: &responders,
            scorer: None,
        };

        let outcome = run_case(&ctx, &case_path, &case, 1).expect("run");
        assert_eq!(outcome.outcome, Outcome::Error);
        assert_eq!(outcome.games.len(), 1);
        let meta = read_meta(&outcome.results_dir.join("meta.json")).expect("meta");
        assert_eq!(meta.errors.len(), 1);
        assert!(meta.errors[0].starts_with("1-2023-06-13:"));
        assert_eq!(meta.outcome, Some(Outcome::Error));
    }
}

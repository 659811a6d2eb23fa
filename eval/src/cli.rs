//! CLI command implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use solver::agents::HttpResponders;
use solver::io::config::GameConfig;
use solver::io::embedder::HttpEmbedder;
use solver::io::puzzle_source::load_puzzles;
use solver::scoring::CategoryScorer;
use tracing::{debug, info};

use crate::case::{CaseFile, discover_cases};
use crate::config::resolve_config;
use crate::report::{Stat, aggregate};
use crate::run::{RunContext, run_case};

fn cases_dir(repo_root: &Path) -> PathBuf {
    repo_root.join("eval").join("cases")
}

/// List all available cases with their archive size.
pub fn list_cases(repo_root: &Path) -> Result<()> {
    for case in discover_cases(&cases_dir(repo_root))? {
        let puzzles = case.case.puzzles.display();
        match load_puzzles(&repo_root.join(&case.case.puzzles), &GameConfig::default()) {
            Ok(records) => println!("{} {} puzzles={}", case.case.id, puzzles, records.len()),
            Err(err) => println!("{} {} error={err:#}", case.case.id, puzzles),
        }
        if let Some(description) = &case.case.description {
            println!("  {}", description.trim());
        }
    }
    Ok(())
}

/// Run a case by id (optionally multiple times).
pub fn run_case_by_id(repo_root: &Path, case_id: &str, runs: u32) -> Result<()> {
    let case_path = cases_dir(repo_root).join(format!("{case_id}.toml"));
    if !case_path.exists() {
        bail!("case {} not found at {}", case_id, case_path.display());
    }
    let case = CaseFile::load(&case_path).context("load case")?;
    let config = resolve_config(repo_root, &case.config).context("resolve solver config")?;
    debug!(case_id, runs, strategy = config.strategy.kind.as_str(), "case loaded");

    let responders = HttpResponders::new(&config);
    let scorer = match &config.embedding {
        Some(embedding) => Some(CategoryScorer::new(Box::new(HttpEmbedder::new(embedding)?))),
        None => None,
    };
    let ctx = RunContext {
        repo_root,
        config: &config,
        responders: &responders,
        scorer: scorer.as_ref(),
    };

    info!(case_id, runs, "starting runs");
    for run_index in 0..runs {
        debug!(case_id, run_index, runs, "starting run");
        let outcome = run_case(&ctx, &case_path, &case, run_index).context("run case")?;
        println!(
            "run: case={} eval_run_id={} games={} outcome={:?} results={}",
            case_id,
            outcome.eval_run_id,
            outcome.games.len(),
            outcome.outcome,
            outcome.results_dir.display()
        );
    }
    Ok(())
}

/// Show aggregated results for a case.
pub fn report_case(repo_root: &Path, case_id: &str) -> Result<()> {
    let results_dir = repo_root.join("eval").join("results").join(case_id);
    let (summary, warnings) = aggregate(&results_dir)?;
    println!("report: case={} runs={} games={}", case_id, summary.runs, summary.games);
    println!(
        "report: perfect={} solved={} partial={} failed={} error={}",
        summary.perfect, summary.solved, summary.partial, summary.failed, summary.error
    );
    if let Some(avg) = summary.avg_duration_secs {
        println!("report: avg_duration_secs={avg:.2}");
    }
    if let Some(pct) = summary.perfect_game_pct {
        println!("report: perfect_games={pct:.1}%");
    }
    let stats = [
        ("solve_rate", summary.solve_rate),
        ("failed_guesses", summary.failed_guesses),
        ("hallucinations", summary.hallucinations),
        ("points", summary.points),
        ("tokens_generated", summary.tokens_generated),
        ("tokens_ingested", summary.tokens_ingested),
        ("category_similarity", summary.category_similarity),
    ];
    for (label, stat) in stats {
        if let Some(Stat { mean, median }) = stat {
            println!("report: {label} mean={mean:.2} median={median:.2}");
        }
    }
    for (strategy, (solved, total)) in summary.strategy_solve_rates {
        println!("report: strategy {strategy} solved {solved}/{total}");
    }
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

/// Remove all results for a case.
pub fn clean_case(repo_root: &Path, case_id: &str) -> Result<()> {
    let case_results = repo_root.join("eval").join("results").join(case_id);
    if case_results.exists() {
        std::fs::remove_dir_all(&case_results)
            .with_context(|| format!("remove {}", case_results.display()))?;
    }
    println!("clean: case={} results={}", case_id, case_results.display());
    Ok(())
}

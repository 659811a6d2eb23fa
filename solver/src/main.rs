//! Word-grouping puzzle solver CLI.
//!
//! `solver play` runs one puzzle (an archive entry or the built-in sample
//! board) with the configured strategy and prints each turn. Exit codes are
//! listed in [`solver::exit_codes`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use solver::agents::HttpResponders;
use solver::core::puzzle::PuzzleState;
use solver::exit_codes;
use solver::io::config::{SolverConfig, StrategyKind, load_config, write_config};
use solver::io::embedder::HttpEmbedder;
use solver::io::puzzle_source::{load_puzzles, sample_board};
use solver::io::records::{EvaluationStore, GameRecord};
use solver::logging;
use solver::play::{GameStop, TurnRecord, TurnResult, play_configured};
use solver::scoring::CategoryScorer;

#[derive(Parser)]
#[command(name = "solver", version, about = "Word-grouping puzzle solver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        #[arg(long, default_value = "solver.toml")]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Check a puzzle archive against the schema and puzzle invariants.
    Validate {
        #[arg(long)]
        puzzles: PathBuf,
        #[arg(long, default_value = "solver.toml")]
        config: PathBuf,
    },
    /// Play one puzzle with the configured strategy.
    Play {
        #[arg(long, default_value = "solver.toml")]
        config: PathBuf,
        /// Puzzle archive; the built-in sample board is used when omitted.
        #[arg(long)]
        puzzles: Option<PathBuf>,
        /// Puzzle id within the archive (defaults to the first puzzle).
        #[arg(long)]
        id: Option<u32>,
        #[arg(long, value_enum)]
        strategy: Option<StrategyKind>,
        #[arg(long)]
        max_strikes: Option<u32>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { config, force } => cmd_init(&config, force),
        Command::Validate { puzzles, config } => cmd_validate(&puzzles, &config),
        Command::Play {
            config,
            puzzles,
            id,
            strategy,
            max_strikes,
        } => cmd_play(&config, puzzles.as_deref(), id, strategy, max_strikes),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    write_config(path, &SolverConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(puzzles: &Path, config: &Path) -> Result<i32> {
    let config = load_config(config)?;
    let records = load_puzzles(puzzles, &config.game)?;
    println!("ok: {} puzzles", records.len());
    Ok(exit_codes::OK)
}

fn cmd_play(
    config_path: &Path,
    puzzles: Option<&Path>,
    id: Option<u32>,
    strategy: Option<StrategyKind>,
    max_strikes: Option<u32>,
) -> Result<i32> {
    let mut config = load_config(config_path)?;
    if let Some(kind) = strategy {
        config.strategy.kind = kind;
    }
    if let Some(max_strikes) = max_strikes {
        config.game.max_strikes = max_strikes;
    }
    config.validate()?;

    let (label, mut puzzle) = match puzzles {
        Some(path) => {
            let records = load_puzzles(path, &config.game)?;
            let record = match id {
                Some(id) => records
                    .iter()
                    .find(|record| record.id == id)
                    .ok_or_else(|| anyhow!("puzzle {id} not found in {}", path.display()))?,
                None => records
                    .first()
                    .ok_or_else(|| anyhow!("{} contains no puzzles", path.display()))?,
            };
            (record.label(), record.to_state(&config.game)?)
        }
        None => (
            "sample".to_string(),
            PuzzleState::new(
                sample_board(),
                config.game.group_size,
                config.game.max_strikes,
            )?,
        ),
    };

    let scorer = match &config.embedding {
        Some(embedding) => Some(CategoryScorer::new(Box::new(HttpEmbedder::new(embedding)?))),
        None => None,
    };
    let responders = HttpResponders::new(&config);
    info!(puzzle = %label, strategy = config.strategy.kind.as_str(), "starting game");
    println!("board: {}", puzzle.full_board().join(", "));
    let outcome = play_configured(
        &mut puzzle,
        &config,
        &responders,
        scorer.as_ref(),
        print_turn,
    )?;

    let metrics = &outcome.metrics;
    match &outcome.stop {
        GameStop::Solved => println!("result: solved in {} turns", outcome.turns),
        GameStop::GameOver {
            strikes,
            max_strikes,
        } => println!("result: game over ({strikes}/{max_strikes} strikes)"),
    }
    println!(
        "metrics: solve_rate={:.1} failed_guesses={} hallucinations={} points={} similarity={:.3} tokens_in={} tokens_out={}",
        metrics.solve_rate(),
        metrics.failed_guesses(),
        metrics.hallucinated_word_count(),
        metrics.points(),
        metrics.running_category_similarity(),
        metrics.tokens_ingested(),
        metrics.tokens_generated(),
    );

    if let Some(db_path) = &config.records.db_path {
        let finished_at = Utc::now();
        let run_id = format!("play-{}", finished_at.format("%Y%m%d_%H%M%S"));
        let store = EvaluationStore::open(db_path)?;
        store.insert(&GameRecord::from_metrics(
            metrics,
            &run_id,
            &label,
            config.strategy.kind.as_str(),
            finished_at,
        ))?;
        println!("recorded: {} run_id={run_id}", db_path.display());
    }

    Ok(if outcome.is_solved() {
        exit_codes::OK
    } else {
        exit_codes::UNSOLVED
    })
}

fn print_turn(turn: &TurnRecord) {
    let words = turn.guess.words.join(", ");
    match &turn.result {
        TurnResult::Hit { category, .. } => {
            println!("turn {}: {words} -> correct ({category})", turn.turn);
        }
        TurnResult::Miss => {
            println!("turn {}: {words} -> wrong (strikes {})", turn.turn, turn.strikes);
        }
        TurnResult::Malformed { reason } => {
            println!("turn {}: no usable guess ({reason}) (strikes {})", turn.turn, turn.strikes);
        }
    }
}

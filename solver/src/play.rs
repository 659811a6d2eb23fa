//! Drive one game: ask the solver, submit, score, repeat.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::agents::{ResponderFactory, Solver, Strategy};
use crate::core::ledger::FailureLedger;
use crate::core::metrics::{Metrics, count_hallucinations};
use crate::core::puzzle::{GameOverError, PuzzleState};
use crate::core::types::{Guess, GuessContext, MalformedReplyError, TurnFeedback};
use crate::io::config::SolverConfig;
use crate::scoring::CategoryScorer;

/// Reason why `play` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameStop {
    Solved,
    GameOver { strikes: u32, max_strikes: u32 },
}

/// What happened to one submitted guess.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnResult {
    Hit {
        category: String,
        /// Index of the category in the original puzzle.
        index: usize,
        similarity: Option<f64>,
    },
    Miss,
    /// The solver produced no usable group; an empty guess was submitted.
    Malformed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnRecord {
    pub turn: u32,
    pub guess: Guess,
    pub result: TurnResult,
    pub strikes: u32,
}

/// Summary of a finished game.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayOutcome {
    pub stop: GameStop,
    pub turns: u32,
    pub metrics: Metrics,
    pub failed: FailureLedger,
}

impl PlayOutcome {
    pub fn is_solved(&self) -> bool {
        self.stop == GameStop::Solved
    }
}

/// Play `puzzle` to the end with `solver`.
///
/// Malformed solver replies cost a strike; only transport and rendering
/// errors abort the game.
#[instrument(skip_all, fields(levels = puzzle.total_levels(), max_strikes = puzzle.max_strikes()))]
pub fn play<S: Solver + ?Sized, F: FnMut(&TurnRecord)>(
    puzzle: &mut PuzzleState,
    solver: &mut S,
    mut metrics: Metrics,
    scorer: Option<&CategoryScorer>,
    mut on_turn: F,
) -> Result<PlayOutcome> {
    let mut failed = FailureLedger::default();
    let board = puzzle.full_board().to_vec();
    let group_size = puzzle.group_size();
    let mut turns = 0u32;

    loop {
        if puzzle.is_solved() {
            info!(turns, solve_rate = metrics.solve_rate(), "puzzle solved");
            return Ok(PlayOutcome {
                stop: GameStop::Solved,
                turns,
                metrics,
                failed,
            });
        }
        if puzzle.is_over() {
            info!(turns, strikes = puzzle.strikes(), "out of strikes");
            return Ok(PlayOutcome {
                stop: GameStop::GameOver {
                    strikes: puzzle.strikes(),
                    max_strikes: puzzle.max_strikes(),
                },
                turns,
                metrics,
                failed,
            });
        }

        let remaining = puzzle.remaining_words();
        let ctx = GuessContext {
            remaining: &remaining,
            board: &board,
            group_size,
            failed: &failed,
        };
        let (guess, malformed) = match solver.guess(&ctx, &mut metrics) {
            Ok(guess) => (guess, None),
            Err(err) => match err.downcast_ref::<MalformedReplyError>() {
                Some(malformed) => {
                    warn!(role = %malformed.role, reason = %malformed.reason, "submitting empty guess");
                    (Guess::new(Vec::new(), ""), Some(malformed.to_string()))
                }
                None => return Err(err),
            },
        };

        turns += 1;
        let matched = match puzzle.guess(&guess.words) {
            Ok(matched) => matched,
            Err(err) => {
                if let Some(over) = err.downcast_ref::<GameOverError>() {
                    warn!(strikes = over.strikes, "guess submitted after game over");
                    return Ok(PlayOutcome {
                        stop: GameStop::GameOver {
                            strikes: over.strikes,
                            max_strikes: over.max_strikes,
                        },
                        turns,
                        metrics,
                        failed,
                    });
                }
                return Err(err);
            }
        };

        let result = match matched {
            Some(category) => {
                let index = puzzle.original_index(&category).unwrap_or_default();
                metrics.add_solve(index);
                let similarity = scorer.and_then(|scorer| scorer.score(&guess.rationale, &category.name));
                if let Some(score) = similarity {
                    metrics.record_similarity(score);
                }
                debug!(turn = turns, category = %category.name, "hit");
                solver.observe(&TurnFeedback::Hit {
                    category: category.name.clone(),
                });
                TurnResult::Hit {
                    category: category.name,
                    index,
                    similarity,
                }
            }
            None => {
                metrics.record_failed_guess();
                metrics.add_hallucinations(count_hallucinations(&board, &guess.words));
                if !guess.words.is_empty() {
                    failed.insert(&guess.words);
                }
                debug!(turn = turns, group = ?guess.words, strikes = puzzle.strikes(), "miss");
                solver.observe(&TurnFeedback::Miss);
                match malformed {
                    Some(reason) => TurnResult::Malformed { reason },
                    None => TurnResult::Miss,
                }
            }
        };

        on_turn(&TurnRecord {
            turn: turns,
            guess,
            result,
            strikes: puzzle.strikes(),
        });
    }
}

/// Build the configured strategy and play `puzzle` with fresh metrics.
pub fn play_configured<F: FnMut(&TurnRecord)>(
    puzzle: &mut PuzzleState,
    config: &SolverConfig,
    responders: &dyn ResponderFactory,
    scorer: Option<&CategoryScorer>,
    on_turn: F,
) -> Result<PlayOutcome> {
    let mut strategy = Strategy::from_config(config, responders)?;
    let metrics = Metrics::with_scoring(
        puzzle.total_levels(),
        config.game.points_per_correct,
        config.game.penalty_per_failed_guess,
    );
    play(puzzle, &mut strategy, metrics, scorer, on_turn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedSolver, OracleSolver, sample_categories, sample_state};

    #[test]
    fn oracle_solves_in_order() {
        let mut puzzle = sample_state(4);
        let mut solver = OracleSolver::new(sample_categories());
        let mut seen = Vec::new();
        let outcome = play(&mut puzzle, &mut solver, Metrics::new(4), None, |turn| {
            seen.push(turn.result.clone());
        })
        .expect("play");
        assert!(outcome.is_solved());
        assert_eq!(outcome.turns, 4);
        assert_eq!(outcome.metrics.solve_order(), &[0, 1, 2, 3]);
        assert_eq!(outcome.metrics.failed_guesses(), 0);
        assert!(matches!(seen[0], TurnResult::Hit { index: 0, .. }));
    }

    #[test]
    fn repeated_wrong_guess_ends_game() {
        let mut puzzle = sample_state(3);
        let mut solver = FixedSolver::new(&["HAIL", "RAIN", "SLEET", "FOG"], "weather");
        let outcome = play(&mut puzzle, &mut solver, Metrics::new(4), None, |_| {}).expect("play");
        assert_eq!(
            outcome.stop,
            GameStop::GameOver {
                strikes: 3,
                max_strikes: 3
            }
        );
        assert_eq!(solver.calls, 3);
        assert_eq!(outcome.metrics.failed_guesses(), 3);
        assert_eq!(outcome.metrics.hallucinated_word_count(), 3);
        assert_eq!(outcome.failed.len(), 1);
    }
}

use serde::{Deserialize, Serialize};
use solver::io::records::GameRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every game solved without a wrong guess.
    Perfect,
    /// Every game solved.
    Solved,
    /// Some games solved.
    Partial,
    /// No game solved.
    Failed,
    /// At least one game aborted with an error.
    Error,
}

pub fn classify_outcome(games: &[GameRecord], errors: usize) -> Outcome {
    if errors > 0 || games.is_empty() {
        return Outcome::Error;
    }
    let solved = games.iter().filter(|game| is_solved(game)).count();
    if solved == games.len() {
        if games.iter().all(|game| game.failed_guesses == 0) {
            Outcome::Perfect
        } else {
            Outcome::Solved
        }
    } else if solved > 0 {
        Outcome::Partial
    } else {
        Outcome::Failed
    }
}

pub fn is_solved(game: &GameRecord) -> bool {
    game.solve_rate >= 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(solve_rate: f64, failed_guesses: u32) -> GameRecord {
        GameRecord {
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            run_id: "eval-1".to_string(),
            puzzle_id: "0".to_string(),
            strategy: "negotiation".to_string(),
            hallucination_count: 0,
            failed_guesses,
            solve_rate,
            solve_order: Vec::new(),
            points: 0,
            tokens_generated: 0,
            tokens_ingested: 0,
            category_similarity: 0.0,
        }
    }

    #[test]
    fn perfect_when_all_solved_cleanly() {
        assert_eq!(classify_outcome(&[game(100.0, 0)], 0), Outcome::Perfect);
        assert_eq!(
            classify_outcome(&[game(100.0, 0), game(100.0, 2)], 0),
            Outcome::Solved
        );
    }

    #[test]
    fn partial_and_failed() {
        assert_eq!(
            classify_outcome(&[game(100.0, 1), game(50.0, 4)], 0),
            Outcome::Partial
        );
        assert_eq!(classify_outcome(&[game(25.0, 4)], 0), Outcome::Failed);
    }

    #[test]
    fn errors_dominate() {
        assert_eq!(classify_outcome(&[game(100.0, 0)], 1), Outcome::Error);
        assert_eq!(classify_outcome(&[], 0), Outcome::Error);
    }
}

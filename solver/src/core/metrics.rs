//! Per-game run statistics.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::puzzle::normalize_word;

/// Points awarded per category found.
pub const POINTS_PER_CORRECT: u32 = 5;
/// Points deducted per wrong guess when the game is scored.
pub const PENALTY_PER_FAILED_GUESS: u32 = 1;

/// Prompt and completion token counts reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Accumulator for one play-through. Never shared between games.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    solved: Vec<bool>,
    solve_order: Vec<usize>,
    failed_guesses: u32,
    hallucinated_word_count: u32,
    tokens_used: BTreeMap<String, TokenUsage>,
    running_category_similarity: f64,
    similarity_samples: u32,
    points_per_correct: u32,
    penalty_per_failed_guess: u32,
}

impl Metrics {
    pub fn new(total_levels: usize) -> Self {
        Self::with_scoring(total_levels, POINTS_PER_CORRECT, PENALTY_PER_FAILED_GUESS)
    }

    pub fn with_scoring(
        total_levels: usize,
        points_per_correct: u32,
        penalty_per_failed_guess: u32,
    ) -> Self {
        Self {
            solved: vec![false; total_levels],
            solve_order: Vec::new(),
            failed_guesses: 0,
            hallucinated_word_count: 0,
            tokens_used: BTreeMap::new(),
            running_category_similarity: 0.0,
            similarity_samples: 0,
            points_per_correct,
            penalty_per_failed_guess,
        }
    }

    /// Mark the category at `index` (original snapshot order) as solved.
    ///
    /// Repeated or out-of-range indices are ignored and return false.
    pub fn add_solve(&mut self, index: usize) -> bool {
        match self.solved.get_mut(index) {
            Some(slot) if !*slot => {
                *slot = true;
                self.solve_order.push(index);
                true
            }
            _ => false,
        }
    }

    pub fn record_failed_guess(&mut self) {
        self.failed_guesses += 1;
    }

    pub fn add_hallucinations(&mut self, count: usize) {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.hallucinated_word_count = self.hallucinated_word_count.saturating_add(count);
    }

    pub fn record_tokens(&mut self, model: &str, usage: TokenUsage) {
        self.tokens_used
            .entry(model.to_string())
            .or_default()
            .add(usage);
    }

    /// Fold one similarity score into the running mean.
    ///
    /// Scores are clamped to `[0, 1]`; non-finite scores are dropped.
    pub fn record_similarity(&mut self, score: f64) {
        if !score.is_finite() {
            return;
        }
        let score = score.clamp(0.0, 1.0);
        self.similarity_samples += 1;
        let k = f64::from(self.similarity_samples);
        let mean = ((k - 1.0) * self.running_category_similarity + score) / k;
        self.running_category_similarity = mean.clamp(0.0, 1.0);
    }

    pub fn solved(&self) -> &[bool] {
        &self.solved
    }

    pub fn solve_order(&self) -> &[usize] {
        &self.solve_order
    }

    pub fn failed_guesses(&self) -> u32 {
        self.failed_guesses
    }

    pub fn hallucinated_word_count(&self) -> u32 {
        self.hallucinated_word_count
    }

    pub fn tokens_used(&self) -> &BTreeMap<String, TokenUsage> {
        &self.tokens_used
    }

    pub fn running_category_similarity(&self) -> f64 {
        self.running_category_similarity
    }

    pub fn similarity_samples(&self) -> u32 {
        self.similarity_samples
    }

    /// Share of categories solved, in percent.
    pub fn solve_rate(&self) -> f64 {
        if self.solved.is_empty() {
            return 0.0;
        }
        let solved = self.solved.iter().filter(|solved| **solved).count();
        solved as f64 / self.solved.len() as f64 * 100.0
    }

    /// Final score: points per solve minus the failure penalty, floored at zero.
    pub fn points(&self) -> u32 {
        let earned = u32::try_from(self.solve_order.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(self.points_per_correct);
        earned.saturating_sub(self.failed_guesses.saturating_mul(self.penalty_per_failed_guess))
    }

    pub fn tokens_ingested(&self) -> u64 {
        self.tokens_used.values().map(|usage| usage.prompt_tokens).sum()
    }

    pub fn tokens_generated(&self) -> u64 {
        self.tokens_used
            .values()
            .map(|usage| usage.completion_tokens)
            .sum()
    }
}

/// Count guessed words that do not appear anywhere on the board.
pub fn count_hallucinations(board: &[String], guess: &[String]) -> usize {
    let board: BTreeSet<String> = board.iter().map(|word| normalize_word(word)).collect();
    guess
        .iter()
        .filter(|word| !board.contains(&normalize_word(word)))
        .count()
}

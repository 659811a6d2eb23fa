//! Shared deterministic types for strategies and the play loop.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::ledger::FailureLedger;

/// One submitted group plus the label or reasoning behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guess {
    pub words: Vec<String>,
    /// Category label the strategy had in mind (used for similarity scoring).
    pub rationale: String,
}

impl Guess {
    pub fn new(words: Vec<String>, rationale: impl Into<String>) -> Self {
        Self {
            words,
            rationale: rationale.into(),
        }
    }
}

/// Everything a strategy sees when asked for the next group.
#[derive(Debug, Clone, Copy)]
pub struct GuessContext<'a> {
    /// Unsolved words in presentation order.
    pub remaining: &'a [String],
    /// All sixteen words, solved or not.
    pub board: &'a [String],
    pub group_size: usize,
    /// Groups already guessed wrong this game.
    pub failed: &'a FailureLedger,
}

/// Outcome of the last submitted guess, reported back to the strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnFeedback {
    Hit { category: String },
    Miss,
}

/// A role kept replying in an unparseable shape after its retry.
///
/// The play loop turns this into a failed turn instead of aborting the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedReplyError {
    pub role: String,
    pub reason: String,
}

impl fmt::Display for MalformedReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} reply malformed: {}", self.role, self.reason)
    }
}

impl std::error::Error for MalformedReplyError {}

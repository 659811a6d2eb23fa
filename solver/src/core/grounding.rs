//! Structural checks on a proposed group, run before any validator is asked.

use std::collections::BTreeSet;
use std::fmt;

use crate::core::ledger::FailureLedger;
use crate::core::puzzle::normalize_word;

/// Why a proposal cannot be submitted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroundingViolation {
    /// Words that are not among the remaining words.
    NotOnBoard(Vec<String>),
    /// The proposal names a word more than once.
    RepeatedWords(Vec<String>),
    WrongSize { expected: usize, actual: usize },
    /// Identical to a group that already failed this game.
    RepeatsFailedGroup,
}

impl fmt::Display for GroundingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroundingViolation::NotOnBoard(words) => write!(
                f,
                "words not among the remaining words: {}",
                words.join(", ")
            ),
            GroundingViolation::RepeatedWords(words) => {
                write!(f, "words repeated in the group: {}", words.join(", "))
            }
            GroundingViolation::WrongSize { expected, actual } => {
                write!(f, "group must have exactly {expected} words, got {actual}")
            }
            GroundingViolation::RepeatsFailedGroup => {
                write!(f, "this exact group was already guessed and was wrong")
            }
        }
    }
}

/// Check `group` against the remaining words and the failure ledger.
///
/// Returns all violations found (empty when the group is grounded).
pub fn grounding_check(
    group: &[String],
    remaining: &[String],
    group_size: usize,
    failed: &FailureLedger,
) -> Vec<GroundingViolation> {
    let mut violations = Vec::new();
    let board: BTreeSet<String> = remaining.iter().map(|word| normalize_word(word)).collect();
    let normalized: Vec<String> = group.iter().map(|word| normalize_word(word)).collect();

    let off_board: Vec<String> = normalized
        .iter()
        .filter(|word| !board.contains(*word))
        .cloned()
        .collect();
    if !off_board.is_empty() {
        violations.push(GroundingViolation::NotOnBoard(off_board));
    }

    let mut seen = BTreeSet::new();
    let mut repeated = BTreeSet::new();
    for word in &normalized {
        if !seen.insert(word.clone()) {
            repeated.insert(word.clone());
        }
    }
    if !repeated.is_empty() {
        violations.push(GroundingViolation::RepeatedWords(
            repeated.into_iter().collect(),
        ));
    }

    if normalized.len() != group_size {
        violations.push(GroundingViolation::WrongSize {
            expected: group_size,
            actual: normalized.len(),
        });
    }

    if failed.contains(group) {
        violations.push(GroundingViolation::RepeatsFailedGroup);
    }

    violations
}

/// Join violations into one feedback sentence.
pub fn describe(violations: &[GroundingViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

//! Memory of rejected groups.
//!
//! - [`FailureLedger`]: every wrong guess of the game, kept sorted and unique.
//! - [`RejectionBuffer`]: proposals turned down during the current turn, bounded.

use std::collections::VecDeque;

use crate::core::puzzle::normalize_word;

/// Normalized, sorted form of a group used for equality checks.
pub fn canonical_group(words: &[String]) -> Vec<String> {
    let mut group: Vec<String> = words.iter().map(|word| normalize_word(word)).collect();
    group.sort();
    group
}

/// Lexicographically sorted set of groups that were guessed and rejected.
///
/// Only grows during a game; [`FailureLedger::clear`] is reserved for resets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureLedger {
    groups: Vec<Vec<String>>,
}

impl FailureLedger {
    /// Record a failed group. Returns false when it was already present.
    pub fn insert(&mut self, words: &[String]) -> bool {
        let group = canonical_group(words);
        match self.groups.binary_search(&group) {
            Ok(_) => false,
            Err(position) => {
                self.groups.insert(position, group);
                true
            }
        }
    }

    pub fn contains(&self, words: &[String]) -> bool {
        self.groups.binary_search(&canonical_group(words)).is_ok()
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

/// A proposal turned down during negotiation, with the reason given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub group: Vec<String>,
    pub reason: String,
}

/// Fixed-capacity FIFO of rejections; the oldest entry is evicted when full.
#[derive(Debug, Clone)]
pub struct RejectionBuffer {
    entries: VecDeque<Rejection>,
    capacity: usize,
}

impl RejectionBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, group: &[String], reason: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Rejection {
            group: canonical_group(group),
            reason: reason.into(),
        });
    }

    pub fn contains(&self, words: &[String]) -> bool {
        let group = canonical_group(words);
        self.entries.iter().any(|entry| entry.group == group)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rejection> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::words;

    #[test]
    fn ledger_stays_sorted_and_unique() {
        let mut ledger = FailureLedger::default();
        assert!(ledger.insert(&words(&["TAB", "MOM", "HEAT", "RAIN"])));
        assert!(ledger.insert(&words(&["BUCKS", "HAIL", "LEVEL", "SHIFT"])));
        assert!(!ledger.insert(&words(&["rain", "heat", "mom", "tab"])));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.groups()[0], words(&["BUCKS", "HAIL", "LEVEL", "SHIFT"]));
        assert_eq!(ledger.groups()[1], words(&["HEAT", "MOM", "RAIN", "TAB"]));
        assert!(ledger.contains(&words(&["MOM", "TAB", "RAIN", "HEAT"])));
    }

    #[test]
    fn rejection_buffer_evicts_oldest() {
        let mut buffer = RejectionBuffer::new(2);
        buffer.push(&words(&["A", "B"]), "first");
        buffer.push(&words(&["C", "D"]), "second");
        buffer.push(&words(&["E", "F"]), "third");
        assert_eq!(buffer.len(), 2);
        assert!(!buffer.contains(&words(&["A", "B"])));
        assert!(buffer.contains(&words(&["f", "e"])));
        let reasons: Vec<&str> = buffer.iter().map(|r| r.reason.as_str()).collect();
        assert_eq!(reasons, vec!["second", "third"]);
    }
}

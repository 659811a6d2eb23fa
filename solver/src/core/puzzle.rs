//! Puzzle state machine.
//!
//! A puzzle starts `ACTIVE` and moves to `SOLVED` once every category has been
//! guessed, or to `OVER` once the strike budget is spent. The only mutation
//! paths are [`PuzzleState::guess`], [`PuzzleState::reset`] and
//! [`PuzzleState::set_board_order`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Words per category on a standard board.
pub const DEFAULT_GROUP_SIZE: usize = 4;
/// Categories per puzzle on a standard board.
pub const DEFAULT_TOTAL_LEVELS: usize = 4;
/// Wrong guesses allowed before the game ends.
pub const DEFAULT_MAX_STRIKES: u32 = 4;

/// Canonical comparison form of a board word: commas dropped, trimmed, upper-cased.
pub fn normalize_word(word: &str) -> String {
    word.replace(',', "").trim().to_uppercase()
}

/// One hidden category of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub level: i32,
    #[serde(rename = "group")]
    pub name: String,
    pub members: Vec<String>,
}

impl Category {
    /// Build a category with normalized members.
    pub fn new(level: i32, name: impl Into<String>, members: &[&str]) -> Self {
        Self {
            level,
            name: name.into(),
            members: members.iter().map(|word| normalize_word(word)).collect(),
        }
    }

    /// Returns true when `words` is exactly this category's member set.
    ///
    /// The comparison is order-insensitive but requires the same word count, so
    /// a guess containing a duplicate never matches.
    pub fn matches(&self, words: &[String]) -> bool {
        if words.len() != self.members.len() {
            return false;
        }
        let guessed: BTreeSet<String> = words.iter().map(|word| normalize_word(word)).collect();
        let members: BTreeSet<String> = self.members.iter().map(|word| normalize_word(word)).collect();
        guessed == members
    }

    pub fn contains(&self, word: &str) -> bool {
        let word = normalize_word(word);
        self.members.iter().any(|member| normalize_word(member) == word)
    }
}

/// Raised by [`PuzzleState::guess`] once the strike budget is spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOverError {
    pub strikes: u32,
    pub max_strikes: u32,
}

impl fmt::Display for GameOverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "game over: {} of {} strikes used",
            self.strikes, self.max_strikes
        )
    }
}

impl std::error::Error for GameOverError {}

/// Mutable state of one play-through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleState {
    original: Vec<Category>,
    active: Vec<Category>,
    board: Vec<String>,
    group_size: usize,
    strikes: u32,
    max_strikes: u32,
}

impl PuzzleState {
    /// Create a puzzle from its categories.
    ///
    /// Every category must hold exactly `group_size` distinct words.
    pub fn new(categories: Vec<Category>, group_size: usize, max_strikes: u32) -> Result<Self> {
        if categories.is_empty() {
            bail!("puzzle must contain at least one category");
        }
        if group_size == 0 {
            bail!("group_size must be > 0");
        }
        if max_strikes == 0 {
            bail!("max_strikes must be > 0");
        }
        let categories: Vec<Category> = categories
            .into_iter()
            .map(|category| Category {
                members: category.members.iter().map(|w| normalize_word(w)).collect(),
                ..category
            })
            .collect();
        for category in &categories {
            if category.members.len() != group_size {
                bail!(
                    "category '{}' has {} members, expected {}",
                    category.name,
                    category.members.len(),
                    group_size
                );
            }
            let distinct: BTreeSet<&String> = category.members.iter().collect();
            if distinct.len() != category.members.len() {
                bail!("category '{}' repeats a member", category.name);
            }
        }
        let board = categories
            .iter()
            .flat_map(|category| category.members.iter().cloned())
            .collect();
        Ok(Self {
            active: categories.clone(),
            original: categories,
            board,
            group_size,
            strikes: 0,
            max_strikes,
        })
    }

    pub fn original_categories(&self) -> &[Category] {
        &self.original
    }

    pub fn active_categories(&self) -> &[Category] {
        &self.active
    }

    pub fn total_levels(&self) -> usize {
        self.original.len()
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    pub fn max_strikes(&self) -> u32 {
        self.max_strikes
    }

    /// Every word of the puzzle in presentation order, solved or not.
    pub fn full_board(&self) -> &[String] {
        &self.board
    }

    /// Unsolved words, in presentation order.
    pub fn remaining_words(&self) -> Vec<String> {
        let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
        for member in self.active.iter().flat_map(|c| c.members.iter()) {
            *pending.entry(member.as_str()).or_default() += 1;
        }
        let mut words = Vec::with_capacity(self.active.len() * self.group_size);
        for word in &self.board {
            if let Some(count) = pending.get_mut(word.as_str())
                && *count > 0
            {
                *count -= 1;
                words.push(word.clone());
            }
        }
        words
    }

    pub fn is_solved(&self) -> bool {
        self.active.is_empty()
    }

    pub fn is_over(&self) -> bool {
        self.strikes >= self.max_strikes || self.is_solved()
    }

    /// Submit one group.
    ///
    /// Returns the matched category (removed from the active set), or `None`
    /// after adding a strike. Fails with [`GameOverError`] when called after the
    /// strike budget is spent. Overlapping categories resolve to the first
    /// match in insertion order.
    pub fn guess(&mut self, words: &[String]) -> Result<Option<Category>> {
        if self.strikes >= self.max_strikes {
            return Err(GameOverError {
                strikes: self.strikes,
                max_strikes: self.max_strikes,
            }
            .into());
        }
        match self.active.iter().position(|category| category.matches(words)) {
            Some(index) => Ok(Some(self.active.remove(index))),
            None => {
                self.strikes += 1;
                Ok(None)
            }
        }
    }

    /// Index of `category` in the original snapshot.
    pub fn original_index(&self, category: &Category) -> Option<usize> {
        self.original.iter().position(|candidate| candidate == category)
    }

    /// Replace the presentation order of the board.
    ///
    /// `order` must be a permutation of the full board.
    pub fn set_board_order(&mut self, order: Vec<String>) -> Result<()> {
        let order: Vec<String> = order.iter().map(|word| normalize_word(word)).collect();
        let mut expected = self.board.clone();
        let mut proposed = order.clone();
        expected.sort();
        proposed.sort();
        if expected != proposed {
            bail!("board order must be a permutation of the puzzle words");
        }
        self.board = order;
        Ok(())
    }

    /// Restore the original categories and clear strikes.
    pub fn reset(&mut self) {
        self.active = self.original.clone();
        self.strikes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_categories, words};

    fn sample_state(max_strikes: u32) -> PuzzleState {
        PuzzleState::new(sample_categories(), DEFAULT_GROUP_SIZE, max_strikes).expect("state")
    }

    #[test]
    fn correct_guess_removes_matching_category() {
        let mut state = sample_state(4);
        let hit = state
            .guess(&words(&["sleet", "HAIL", "Snow", "RAIN"]))
            .expect("guess")
            .expect("match");
        assert_eq!(hit.name, "WET WEATHER");
        assert_eq!(state.active_categories().len(), 3);
        assert_eq!(state.strikes(), 0);
        assert!(!state.remaining_words().contains(&"HAIL".to_string()));
    }

    #[test]
    fn wrong_guess_adds_strike_and_keeps_categories() {
        let mut state = sample_state(4);
        let miss = state
            .guess(&words(&["HAIL", "RAIN", "SLEET", "KAYAK"]))
            .expect("guess");
        assert!(miss.is_none());
        assert_eq!(state.strikes(), 1);
        assert_eq!(state.active_categories().len(), 4);
    }

    #[test]
    fn duplicate_words_never_match() {
        let mut state = sample_state(4);
        let miss = state
            .guess(&words(&["HAIL", "HAIL", "RAIN", "SLEET", "SNOW"]))
            .expect("guess");
        assert!(miss.is_none());
        let miss = state
            .guess(&words(&["HAIL", "RAIN", "SLEET"]))
            .expect("guess");
        assert!(miss.is_none());
        assert_eq!(state.strikes(), 2);
    }

    #[test]
    fn guess_after_max_strikes_is_game_over() {
        let mut state = sample_state(2);
        let wrong = words(&["HAIL", "RAIN", "SLEET", "KAYAK"]);
        state.guess(&wrong).expect("first");
        state.guess(&wrong).expect("second");
        assert!(state.is_over());
        assert!(!state.is_solved());

        let err = state.guess(&wrong).unwrap_err();
        let over = err.downcast_ref::<GameOverError>().expect("game over error");
        assert_eq!(over.strikes, 2);
        assert_eq!(state.strikes(), 2, "strikes never exceed the limit");
    }

    #[test]
    fn reset_restores_snapshot() {
        let mut state = sample_state(4);
        let before = state.clone();
        state
            .guess(&words(&["BUCKS", "HEAT", "JAZZ", "NETS"]))
            .expect("hit");
        state
            .guess(&words(&["TAB", "MOM", "HEAT", "RAIN"]))
            .expect("miss");
        state.reset();
        assert_eq!(state, before);
    }

    #[test]
    fn remaining_words_follow_board_order() {
        let mut state = sample_state(4);
        let mut order: Vec<String> = state.full_board().to_vec();
        order.reverse();
        state.set_board_order(order.clone()).expect("order");
        assert_eq!(state.remaining_words(), order);

        state
            .guess(&words(&["KAYAK", "LEVEL", "MOM", "RACECAR"]))
            .expect("hit");
        assert_eq!(state.remaining_words(), order[4..].to_vec());
    }

    #[test]
    fn board_order_must_be_a_permutation() {
        let mut state = sample_state(4);
        let mut order = state.full_board().to_vec();
        order[0] = "GLACIER".to_string();
        let err = state.set_board_order(order).unwrap_err();
        assert!(err.to_string().contains("permutation"));
    }

    #[test]
    fn rejects_wrong_sized_category() {
        let mut categories = sample_categories();
        categories[1].members.pop();
        let err = PuzzleState::new(categories, 4, 4).unwrap_err();
        assert_eq!(err.to_string(), "category 'NBA TEAMS' has 3 members, expected 4");
    }

    #[test]
    fn original_index_tracks_snapshot_position() {
        let mut state = sample_state(4);
        let hit = state
            .guess(&words(&["OPTION", "RETURN", "SHIFT", "TAB"]))
            .expect("guess")
            .expect("match");
        assert_eq!(state.original_index(&hit), Some(2));
    }
}

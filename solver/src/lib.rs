//! Word-grouping puzzle solver.
//!
//! A board of sixteen words hides four categories of four. A pluggable
//! strategy proposes one group per turn; the puzzle state machine accepts
//! or strikes it until the board is cleared or the strikes run out. The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (puzzle state, metrics, subset
//!   enumeration, grounding checks, reply parsing). No I/O, fully testable in
//!   isolation.
//! - **[`io`]**: Side-effecting operations (config files, HTTP responders,
//!   embeddings, puzzle files, SQLite records, prompt rendering).
//!
//! Strategies live in [`agents`]; [`play`] drives a strategy against a puzzle
//! and [`scoring`] rates the category labels of correct guesses.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod play;
pub mod scoring;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

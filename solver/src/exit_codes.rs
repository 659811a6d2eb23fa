//! Stable exit codes for solver CLI commands.

/// Command succeeded; for `solver play`, every category was found.
pub const OK: i32 = 0;
/// Command failed due to invalid config, puzzle file, transport or other errors.
pub const INVALID: i32 = 1;
/// `solver play` ran out of strikes before clearing the board.
pub const UNSOLVED: i32 = 2;

//! I/O helpers for solver commands.

pub mod config;
pub mod embedder;
pub mod prompt;
pub mod puzzle_source;
pub mod records;
pub mod responder;

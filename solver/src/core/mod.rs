//! Deterministic, pure logic shared by the solver.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod combinations;
pub mod grounding;
pub mod ledger;
pub mod metrics;
pub mod puzzle;
pub mod reply;
pub mod types;

//! LivePolls Library
//!
//! Headless replay of the poll sync engine against the in-memory backend.

pub mod headless;

// Re-export main entry points
pub use headless::{run_replay, run_script, ReplaySummary};

//! Headless mode - NDJSON event output for scripted replays
//!
//! Replays a script of steps against the in-memory backend and writes one JSON
//! object per line. Engine events are written with their own `event` tag;
//! the variants of [`HeadlessEvent`] cover everything else a replay reports.
//!
//! # Example Output
//!
//! ```json
//! {"event":"installed","polls":1,"options":2,"dropped":0,"timestamp":1692180000000}
//! {"event":"connection_changed","old":"disconnected","new":"connected","timestamp":1692180000001}
//! {"event":"failure","detail":"Remote store error: offline","timestamp":1692180000002}
//! ```

pub mod runner;
pub mod script;

use std::io::Write;

use chrono::Utc;
use serde::Serialize;

use polls_app::{ConnectionState, EngineEvent, ViewState};
use polls_core::prelude::*;
use polls_core::{OptionId, Poll, PollId};

pub use runner::{run_replay, run_script, ReplaySummary};
pub use script::{parse_step, FailTarget, ScriptStep, SeedOption, SeedPoll};

/// Events emitted in headless mode, besides engine events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// A store operation failed (one-shot notification)
    Failure { detail: String, timestamp: i64 },

    /// Canonical state at this point of the replay
    Snapshot {
        connection: ConnectionState,
        view_state: ViewState,
        polls: Vec<PollSummary>,
        timestamp: i64,
    },

    /// A step could not be carried out
    Error {
        line: Option<usize>,
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

/// A poll as shown in a snapshot, with its derived values
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub id: PollId,
    pub name: String,
    pub total_count: u64,
    pub last_updated_option: Option<String>,
    pub options: Vec<OptionSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSummary {
    pub id: OptionId,
    pub name: String,
    pub count: u64,
}

impl From<&Poll> for PollSummary {
    fn from(poll: &Poll) -> Self {
        Self {
            id: poll.id,
            name: poll.name.clone(),
            total_count: poll.total_count(),
            last_updated_option: poll.last_updated_option().map(|o| o.name.clone()),
            options: poll
                .options
                .iter()
                .map(|o| OptionSummary {
                    id: o.id,
                    name: o.name.clone(),
                    count: o.count,
                })
                .collect(),
        }
    }
}

impl HeadlessEvent {
    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn failure(detail: String) -> Self {
        Self::Failure {
            detail,
            timestamp: Self::now(),
        }
    }

    pub fn snapshot<'a>(
        connection: ConnectionState,
        view_state: ViewState,
        polls: impl IntoIterator<Item = &'a Poll>,
    ) -> Self {
        Self::Snapshot {
            connection,
            view_state,
            polls: polls.into_iter().map(PollSummary::from).collect(),
            timestamp: Self::now(),
        }
    }

    pub fn error(line: Option<usize>, message: String, fatal: bool) -> Self {
        Self::Error {
            line,
            message,
            fatal,
            timestamp: Self::now(),
        }
    }
}

/// NDJSON writer for headless output
pub struct HeadlessOutput<W> {
    writer: W,
    written: usize,
}

impl<W: Write> HeadlessOutput<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of lines written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn emit(&mut self, event: &HeadlessEvent) -> Result<()> {
        let value = serde_json::to_value(event)?;
        self.write_line(&value)
    }

    /// Write an engine event, stamped with the current time
    pub fn emit_engine(&mut self, event: &EngineEvent) -> Result<()> {
        let mut value = serde_json::to_value(event)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("timestamp".to_string(), HeadlessEvent::now().into());
        }
        self.write_line(&value)
    }

    fn write_line(&mut self, value: &serde_json::Value) -> Result<()> {
        let json = serde_json::to_string(value)?;
        writeln!(self.writer, "{}", json)?;

        // Flush to ensure immediate output
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }
}

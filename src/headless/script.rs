//! Replay script format
//!
//! A script is NDJSON: one step object per line, tagged by `step`. Blank
//! lines and lines starting with `#` are skipped.
//!
//! ```json
//! {"step":"seed","polls":[{"name":"Console","options":[{"name":"PS5"},{"name":"Switch"}]}]}
//! {"step":"start"}
//! {"step":"increment","poll":"Console","option":"PS5"}
//! {"step":"settle"}
//! {"step":"snapshot"}
//! ```

use serde::Deserialize;
use serde_json::Value;

use polls_app::LifecycleSignal;
use polls_core::prelude::*;
use polls_core::{Channel, OptionId, Poll, PollId, PollOption};
use polls_realtime::StoreOp;

/// Default quiet period for `settle` steps
pub const DEFAULT_SETTLE_MS: u64 = 50;

/// One step of a replay script
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Put rows straight into the backend, without change events
    Seed {
        #[serde(default)]
        polls: Vec<SeedPoll>,
    },

    /// Refresh, then connect
    Start,

    Refresh,

    Connect,

    Disconnect,

    /// Deliver an app phase signal
    Signal { signal: LifecycleSignal },

    /// Create a poll with the named options
    CreatePoll {
        name: String,
        #[serde(default)]
        options: Vec<String>,
    },

    /// Vote for an option, looked up by poll and option name in the backend
    Increment { poll: String, option: String },

    /// Publish a raw payload on a channel, bypassing the store
    Inject { channel: Channel, payload: Value },

    /// Make the next call of an operation fail
    FailNext {
        target: FailTarget,
        #[serde(default = "default_failure_message")]
        message: String,
    },

    /// Process messages until the channels are quiet
    Settle {
        #[serde(default = "default_settle_ms")]
        quiet_ms: u64,
    },

    /// Report canonical state
    Snapshot,
}

impl ScriptStep {
    /// Step name as written in scripts
    pub fn name(&self) -> &'static str {
        match self {
            Self::Seed { .. } => "seed",
            Self::Start => "start",
            Self::Refresh => "refresh",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Signal { .. } => "signal",
            Self::CreatePoll { .. } => "create_poll",
            Self::Increment { .. } => "increment",
            Self::Inject { .. } => "inject",
            Self::FailNext { .. } => "fail_next",
            Self::Settle { .. } => "settle",
            Self::Snapshot => "snapshot",
        }
    }
}

fn default_failure_message() -> String {
    "injected failure".to_string()
}

fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}

/// What a `fail_next` step targets: a store operation or the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FailTarget {
    Store(StoreOp),
    Transport(TransportOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportOp {
    Connect,
}

/// A seeded poll. Ids are generated when omitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedPoll {
    #[serde(default)]
    pub id: Option<PollId>,
    pub name: String,
    #[serde(default)]
    pub options: Vec<SeedOption>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedOption {
    #[serde(default)]
    pub id: Option<OptionId>,
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

impl SeedPoll {
    /// Build the poll row and its option rows
    pub fn into_rows(self) -> (Poll, Vec<PollOption>) {
        let mut poll = Poll::new(self.name);
        if let Some(id) = self.id {
            poll.id = id;
        }

        let options = self
            .options
            .into_iter()
            .map(|seed| PollOption {
                id: seed.id.unwrap_or_default(),
                name: seed.name,
                count: seed.count,
                poll_id: poll.id,
            })
            .collect();
        (poll, options)
    }
}

/// Parse one script line. Returns `None` for blank lines and comments.
pub fn parse_step(line: &str) -> Option<Result<ScriptStep>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(trimmed).map_err(Error::from))
}

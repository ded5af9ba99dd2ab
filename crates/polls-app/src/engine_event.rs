//! Domain events emitted by the PollsEngine for external consumers
//!
//! Events are broadcast after each state transition via
//! `PollsEngine::subscribe()`. They describe what changed; the full state is
//! always available from the poll snapshot.

use serde::Serialize;

use polls_core::{Channel, OptionId, PollId};

use crate::lifecycle::ConnectionState;

/// Domain events emitted by the engine.
///
/// Subscribers that fall behind lose the oldest events; canonical state is
/// unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    // ─────────────────────────────────────────────────────────
    // Canonical State
    // ─────────────────────────────────────────────────────────
    /// A bulk fetch replaced all state
    Installed {
        polls: usize,
        options: usize,
        dropped: usize,
    },

    /// A streamed poll insert was appended
    PollInserted { poll_id: PollId, name: String },

    /// A poll's last-updated option moved
    PollUpdated {
        poll_id: PollId,
        last_updated_option_id: Option<OptionId>,
    },

    /// A streamed option insert was attached to its poll
    OptionInserted {
        poll_id: PollId,
        option_id: OptionId,
        name: String,
    },

    /// An option was replaced in place
    OptionUpdated {
        poll_id: PollId,
        option_id: OptionId,
        count: u64,
    },

    /// A change was discarded without touching state
    ChangeDropped {
        channel: Channel,
        id: Option<String>,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────
    // Connection
    // ─────────────────────────────────────────────────────────
    /// The realtime connection state changed
    ConnectionChanged {
        old: ConnectionState,
        new: ConnectionState,
    },

    // ─────────────────────────────────────────────────────────
    // Engine Lifecycle
    // ─────────────────────────────────────────────────────────
    /// Engine is shutting down
    Shutdown,
}

impl EngineEvent {
    /// Returns a short string label for this event type (for logging/debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Installed { .. } => "installed",
            Self::PollInserted { .. } => "poll_inserted",
            Self::PollUpdated { .. } => "poll_updated",
            Self::OptionInserted { .. } => "option_inserted",
            Self::OptionUpdated { .. } => "option_updated",
            Self::ChangeDropped { .. } => "change_dropped",
            Self::ConnectionChanged { .. } => "connection_changed",
            Self::Shutdown => "shutdown",
        }
    }
}

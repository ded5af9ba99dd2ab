//! Message types fed into the engine's single message channel

use polls_core::{Channel, OptionChange, OptionId, Poll, PollChange, PollOption};

use crate::lifecycle::LifecycleSignal;

/// Everything the engine reacts to arrives as a `Message`.
///
/// The channel forwarders produce decoded changes, a [`crate::PollsHandle`]
/// produces user actions, and background store tasks report their results.
/// The engine drains them one at a time, so only it touches the reconciler.
#[derive(Debug, Clone)]
pub enum Message {
    // ─────────────────────────────────────────────────────────
    // Channel Changes
    // ─────────────────────────────────────────────────────────
    /// Decoded change from the `polls` channel
    PollChange(PollChange),

    /// Decoded change from the `options` channel
    OptionChange(OptionChange),

    /// A payload on `channel` could not be decoded and was dropped
    DecodeFailed { channel: Channel, reason: String },

    // ─────────────────────────────────────────────────────────
    // User Actions
    // ─────────────────────────────────────────────────────────
    /// Insert a poll and its options remotely
    CreatePoll(Poll),

    /// Add one vote to an option remotely
    IncrementOption(OptionId),

    /// Re-fetch everything and install it
    Refresh,

    /// App phase change
    Signal(LifecycleSignal),

    // ─────────────────────────────────────────────────────────
    // Background Task Results
    // ─────────────────────────────────────────────────────────
    /// Both bulk reads succeeded; install as the new state
    Fetched {
        polls: Vec<Poll>,
        options: Vec<PollOption>,
    },
}

impl Message {
    /// Channel the message arrived on, for channel changes
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Self::PollChange(_) => Some(Channel::Polls),
            Self::OptionChange(_) => Some(Channel::Options),
            Self::DecodeFailed { channel, .. } => Some(*channel),
            _ => None,
        }
    }

    /// Short name for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::PollChange(_) => "poll_change",
            Self::OptionChange(_) => "option_change",
            Self::DecodeFailed { .. } => "decode_failed",
            Self::CreatePoll(_) => "create_poll",
            Self::IncrementOption(_) => "increment_option",
            Self::Refresh => "refresh",
            Self::Signal(_) => "signal",
            Self::Fetched { .. } => "fetched",
        }
    }
}

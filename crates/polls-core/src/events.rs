//! Typed change events delivered over the realtime channels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Poll, PollOption};

/// The two independent realtime channels, one per entity table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Polls,
    Options,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Polls, Channel::Options];

    /// Entity name used in diagnostics and decode errors
    pub fn entity(&self) -> &'static str {
        match self {
            Channel::Polls => "poll",
            Channel::Options => "option",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Polls => write!(f, "polls"),
            Channel::Options => write!(f, "options"),
        }
    }
}

/// Kind of a row change. Deletes are never produced by the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
}

impl ChangeKind {
    /// Parse the realtime `type` tag (`INSERT`, `UPDATE`)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
        }
    }
}

/// A decoded change carrying the typed record
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub kind: ChangeKind,
    pub record: T,
    /// Server commit time, informational only (never used for ordering)
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl<T> Change<T> {
    pub fn insert(record: T) -> Self {
        Self {
            kind: ChangeKind::Insert,
            record,
            commit_timestamp: None,
        }
    }

    pub fn update(record: T) -> Self {
        Self {
            kind: ChangeKind::Update,
            record,
            commit_timestamp: None,
        }
    }
}

pub type PollChange = Change<Poll>;
pub type OptionChange = Change<PollOption>;

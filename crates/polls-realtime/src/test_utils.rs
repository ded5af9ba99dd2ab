//! Test utilities for realtime types
//!
//! Provides helpers for building polls, options and channel envelopes.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use polls_core::{ChangeKind, OptionId, Poll, PollId, PollOption};

/// Creates a poll with a fixed creation time and no options.
///
/// # Arguments
/// * `name` - Poll title
pub fn test_poll(name: &str) -> Poll {
    let created = Utc.with_ymd_and_hms(2023, 8, 16, 10, 0, 0).unwrap();
    Poll {
        id: PollId::new(),
        name: name.to_string(),
        created_at: created,
        updated_at: created,
        last_updated_option_id: None,
        options: Vec::new(),
    }
}

/// Creates an option bound to `poll_id`.
///
/// # Arguments
/// * `poll_id` - Owning poll
/// * `name` - Option label
/// * `count` - Current vote count
pub fn test_option(poll_id: PollId, name: &str, count: u64) -> PollOption {
    PollOption {
        id: OptionId::new(),
        name: name.to_string(),
        count,
        poll_id,
    }
}

/// Builds a change envelope for a poll record.
pub fn poll_envelope(kind: ChangeKind, poll: &Poll) -> Value {
    envelope(kind, "polls", serde_json::to_value(poll).unwrap())
}

/// Builds a change envelope for an option record.
pub fn option_envelope(kind: ChangeKind, option: &PollOption) -> Value {
    envelope(kind, "options", serde_json::to_value(option).unwrap())
}

fn envelope(kind: ChangeKind, table: &str, record: Value) -> Value {
    json!({
        "type": kind.as_tag(),
        "schema": "public",
        "table": table,
        "commit_timestamp": "2023-08-16T10:00:00Z",
        "record": record,
    })
}

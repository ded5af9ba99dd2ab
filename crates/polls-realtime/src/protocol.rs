//! Realtime change payload handling
//!
//! Every message on a table channel carries a change envelope:
//!
//! ```json
//! {"type":"UPDATE","schema":"public","table":"options",
//!  "commit_timestamp":"2023-08-16T10:00:00Z",
//!  "record":{"id":"…","name":"PS5","count":3,"pollId":"…"}}
//! ```
//!
//! Decoding is strict per entity: the record must satisfy the typed schema
//! of [`Poll`] or [`PollOption`]. Callers at the channel boundary are expected
//! to log and drop anything that fails here.

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use polls_core::model::timestamp;
use polls_core::prelude::*;
use polls_core::{Change, ChangeKind, Channel, OptionChange, Poll, PollChange, PollOption};

use crate::channel::ChannelTopic;

/// A raw change envelope (before typed decoding)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RawChange {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
    #[serde(default)]
    pub record: Option<Value>,
}

impl RawChange {
    /// Parse an envelope from a channel payload
    pub fn parse(payload: &Value, entity: &'static str) -> Result<Self> {
        RawChange::deserialize(payload).map_err(|e| Error::decode(entity, e.to_string()))
    }

    /// Get a human-readable summary of this change
    pub fn summary(&self) -> String {
        match &self.table {
            Some(table) => format!("{} on {}", self.kind, table),
            None => self.kind.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Typed Decoding (Free Functions)
// ─────────────────────────────────────────────────────────

/// Decodes a `polls` channel payload into a typed poll change.
///
/// # Returns
/// * `Ok(PollChange)` for a well-formed `INSERT`/`UPDATE` envelope
/// * `Err(Error::UnsupportedChange)` for any other change type (e.g. `DELETE`)
/// * `Err(Error::Decode)` if the envelope or record does not match the schema
pub fn decode_poll_change(payload: &Value) -> Result<PollChange> {
    decode_change::<Poll>(Channel::Polls.entity(), payload)
}

/// Decodes an `options` channel payload into a typed option change.
pub fn decode_option_change(payload: &Value) -> Result<OptionChange> {
    decode_change::<PollOption>(Channel::Options.entity(), payload)
}

fn decode_change<T: DeserializeOwned>(entity: &'static str, payload: &Value) -> Result<Change<T>> {
    let raw = RawChange::parse(payload, entity)?;
    trace!("Decoding {} change: {}", entity, raw.summary());

    let kind = ChangeKind::from_tag(&raw.kind).ok_or_else(|| Error::unsupported_change(&raw.kind))?;

    let record = match raw.record {
        Some(record @ Value::Object(_)) => record,
        Some(_) => return Err(Error::decode(entity, "record is not an object")),
        None => return Err(Error::decode(entity, "payload has no record")),
    };

    let record = T::deserialize(&record).map_err(|e| Error::decode(entity, e.to_string()))?;

    let commit_timestamp = raw.commit_timestamp.as_deref().and_then(timestamp::parse);

    Ok(Change {
        kind,
        record,
        commit_timestamp,
    })
}

/// Builds the envelope a store emits for a row change on `topic`.
pub fn encode_change<T: Serialize>(
    kind: ChangeKind,
    topic: &ChannelTopic,
    record: &T,
) -> Result<Value> {
    let record = serde_json::to_value(record)?;
    Ok(json!({
        "type": kind.as_tag(),
        "schema": topic.schema(),
        "table": topic.table_name(),
        "commit_timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        "record": record,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polls_core::PollId;

    fn poll_record() -> Value {
        json!({
            "id": "6f1b2c1e-8f1e-4a59-9a57-0d3f3d0f4b11",
            "name": "Console",
            "createdAt": "2023-08-16T10:00:00Z",
            "updatedAt": "2023-08-16T10:00:00Z"
        })
    }

    fn option_record(count: i64) -> Value {
        json!({
            "id": "0a3c5d4e-1b2a-4c3d-8e9f-aabbccddeeff",
            "name": "PS5",
            "count": count,
            "pollId": "6f1b2c1e-8f1e-4a59-9a57-0d3f3d0f4b11"
        })
    }

    #[test]
    fn test_decode_poll_insert() {
        let payload = json!({
            "type": "INSERT",
            "schema": "public",
            "table": "polls",
            "commit_timestamp": "2023-08-16T10:00:01Z",
            "record": poll_record()
        });

        let change = decode_poll_change(&payload).unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.record.name, "Console");
        assert!(change.record.options.is_empty());
        assert!(change.commit_timestamp.is_some());
    }

    #[test]
    fn test_decode_option_update() {
        let payload = json!({"type": "UPDATE", "record": option_record(4)});

        let change = decode_option_change(&payload).unwrap();
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(change.record.count, 4);
        assert_eq!(
            change.record.poll_id,
            "6f1b2c1e-8f1e-4a59-9a57-0d3f3d0f4b11".parse::<PollId>().unwrap()
        );
    }

    #[test]
    fn test_decode_missing_record_fails() {
        let payload = json!({"type": "INSERT"});
        let err = decode_poll_change(&payload).unwrap_err();
        assert!(matches!(err, Error::Decode { entity: "poll", .. }));
    }

    #[test]
    fn test_decode_delete_is_unsupported() {
        let payload = json!({"type": "DELETE", "old_record": {"id": "x"}});
        let err = decode_option_change(&payload).unwrap_err();
        assert!(matches!(err, Error::UnsupportedChange { .. }));
    }

    #[test]
    fn test_decode_record_schema_mismatch() {
        let payload = json!({"type": "UPDATE", "record": option_record(-2)});
        assert!(matches!(
            decode_option_change(&payload),
            Err(Error::Decode { entity: "option", .. })
        ));

        // An option record on the polls channel misses poll fields
        let payload = json!({"type": "INSERT", "record": option_record(1)});
        assert!(decode_poll_change(&payload).is_err());
    }

    #[test]
    fn test_decode_non_object_payload() {
        assert!(decode_poll_change(&json!("INSERT")).is_err());
        assert!(decode_poll_change(&json!({"type": "INSERT", "record": [1, 2]})).is_err());
    }

    #[test]
    fn test_encode_then_decode_option() {
        let topic = ChannelTopic::table("options", "public");
        let option = PollOption::new("Switch", PollId::new());

        let payload = encode_change(ChangeKind::Insert, &topic, &option).unwrap();
        assert_eq!(payload["table"], "options");
        assert_eq!(payload["schema"], "public");

        let change = decode_option_change(&payload).unwrap();
        assert_eq!(change.record, option);
    }
}

//! Poll and option domain types
//!
//! A [`Poll`] owns an ordered list of [`PollOption`]s. The list is kept in
//! insertion order and is never part of the wire record: options travel on
//! their own table/channel and are attached to their poll locally.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id!(
    /// Identity of a poll
    PollId
);

uuid_id!(
    /// Identity of a poll option
    OptionId
);

// ─────────────────────────────────────────────────────────
// Poll Option
// ─────────────────────────────────────────────────────────

/// A single answer within a poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: OptionId,
    pub name: String,
    /// Vote count, incremented server-side only
    pub count: u64,
    pub poll_id: PollId,
}

impl PollOption {
    /// Create a zero-count option bound to `poll_id`
    pub fn new(name: impl Into<String>, poll_id: PollId) -> Self {
        Self {
            id: OptionId::new(),
            name: name.into(),
            count: 0,
            poll_id,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Poll
// ─────────────────────────────────────────────────────────

/// A poll together with its locally attached options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub name: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    /// May reference an option that is not (yet) attached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_option_id: Option<OptionId>,
    #[serde(skip)]
    pub options: Vec<PollOption>,
}

impl Poll {
    /// Create an empty poll with a fresh id, stamped now
    pub fn new(name: impl Into<String>) -> Self {
        // Records carry microsecond precision
        let now = Utc::now().trunc_subsecs(6);
        Self {
            id: PollId::new(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            last_updated_option_id: None,
            options: Vec::new(),
        }
    }

    /// Create a poll whose options are bound to its id
    pub fn with_options<I, S>(name: impl Into<String>, option_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut poll = Self::new(name);
        poll.options = option_names
            .into_iter()
            .map(|n| PollOption::new(n, poll.id))
            .collect();
        poll
    }

    /// Sum of all attached option counts
    pub fn total_count(&self) -> u64 {
        self.options.iter().map(|o| o.count).sum()
    }

    /// The attached option matching `last_updated_option_id`, if any
    pub fn last_updated_option(&self) -> Option<&PollOption> {
        let id = self.last_updated_option_id?;
        self.options.iter().find(|o| o.id == id)
    }

    pub fn option(&self, id: OptionId) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn has_option(&self, id: OptionId) -> bool {
        self.options.iter().any(|o| o.id == id)
    }
}

// ─────────────────────────────────────────────────────────
// Timestamp codec
// ─────────────────────────────────────────────────────────

/// Serde codec for record timestamps.
///
/// Accepts RFC 3339 (with offset) as well as the naive
/// `YYYY-MM-DDTHH:MM:SS[.ffffff]` form PostgREST returns for
/// `timestamp without time zone` columns; naive values are read as UTC.
/// Always writes RFC 3339 UTC with microsecond precision.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    /// Parse a timestamp in any of the accepted forms
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}

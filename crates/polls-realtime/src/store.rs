//! Remote store contract
//!
//! Bulk reads and writes against the authoritative store. Writes never touch
//! local state; their effect becomes visible only when the matching change
//! event is echoed back on a channel.

use serde::{Deserialize, Serialize};

use polls_core::prelude::*;
use polls_core::{OptionId, Poll, PollOption};

/// Remote store operations. Every call may fail; failures are reported to
/// the caller and never retried here.
#[trait_variant::make(RemoteStore: Send)]
pub trait LocalRemoteStore {
    /// Fetch every poll row, in store order, without options attached
    async fn fetch_polls(&self) -> Result<Vec<Poll>>;

    /// Fetch every option row, in store order
    async fn fetch_options(&self) -> Result<Vec<PollOption>>;

    /// Insert a poll row (its options are not part of the row)
    async fn insert_poll(&self, poll: &Poll) -> Result<()>;

    /// Insert option rows
    async fn insert_options(&self, options: &[PollOption]) -> Result<()>;

    /// Atomically increment an option's count on the server
    async fn increment_option_count(&self, id: OptionId) -> Result<()>;
}

/// Names of the store operations, used for failure injection and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOp {
    FetchPolls,
    FetchOptions,
    InsertPoll,
    InsertOptions,
    IncrementOptionCount,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreOp::FetchPolls => "fetch_polls",
            StoreOp::FetchOptions => "fetch_options",
            StoreOp::InsertPoll => "insert_poll",
            StoreOp::InsertOptions => "insert_options",
            StoreOp::IncrementOptionCount => "increment_option_count",
        };
        write!(f, "{}", name)
    }
}

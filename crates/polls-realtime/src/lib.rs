//! # polls-realtime - Realtime Channels and Remote Store
//!
//! The boundary between the sync engine and the hosted backend: the change
//! payload protocol, the transport and store contracts, and an in-memory
//! backend implementing both.
//!
//! Depends on [`polls_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Protocol Decoding
//! - [`decode_poll_change()`] - Decode a `polls` channel payload
//! - [`decode_option_change()`] - Decode an `options` channel payload
//! - [`encode_change()`] - Build a change envelope for a row
//!
//! ### Contracts
//! - [`RemoteStore`] - Bulk fetch and write operations
//! - [`ChannelSubscriber`] - Connect/disconnect and per-topic subscriptions
//! - [`ChannelTopic`], [`ChannelMessage`], [`Subscription`]
//!
//! ### In-Memory Backend
//! - [`InMemoryBackend`] - Store + transport that echoes writes as change events

pub mod channel;
pub mod memory;
pub mod protocol;
pub mod store;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

// Public API re-exports
pub use channel::{
    ChannelMessage, ChannelSubscriber, ChannelTopic, LocalChannelSubscriber, Subscription,
};
pub use memory::{InMemoryBackend, TransportCall, DEFAULT_SUBSCRIPTION_BUFFER};
pub use protocol::{decode_option_change, decode_poll_change, encode_change};
pub use store::{LocalRemoteStore, RemoteStore, StoreOp};

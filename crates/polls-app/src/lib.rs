//! # polls-app - State Reconciliation and Orchestration
//!
//! Keeps a local, observable collection of polls consistent with the remote
//! store: a bulk fetch installs the initial state, then changes streamed over
//! the `polls` and `options` channels are merged incrementally.
//!
//! Depends on [`polls_core`] for domain types and [`polls_realtime`] for the
//! store and channel contracts.
//!
//! ## Public API
//!
//! ### Engine
//! - [`PollsEngine`] - Owns the reconciler, connection lifecycle and view state
//! - [`PollsHandle`] - Cloneable sender of user actions to a running engine
//! - [`EngineEvent`] - Events broadcast to external consumers
//! - [`Message`] - Changes serialized into the single-writer channel
//!
//! ### Components
//! - [`StateReconciler`] - Merge rules for bulk installs and streamed changes
//! - [`ConnectionLifecycleController`] - Connect/subscribe and teardown ordering
//! - [`ViewStateMachine`] - Progress state and one-shot failure notifications
//!
//! ### Configuration
//! - [`config::Settings`] - Loaded from `.livepolls/config.toml`

pub mod config;
pub mod engine;
pub mod engine_event;
pub mod handle;
pub mod ingest;
pub mod lifecycle;
pub mod message;
pub mod reconciler;
pub mod view_state;

// Public API re-exports
pub use config::Settings;
pub use engine::PollsEngine;
pub use engine_event::EngineEvent;
pub use handle::PollsHandle;
pub use ingest::decode_message;
pub use lifecycle::{ConnectOutcome, ConnectionLifecycleController, ConnectionState, LifecycleSignal};
pub use message::Message;
pub use reconciler::{ApplyOutcome, InstallSummary, PollSnapshot, StateReconciler};
pub use view_state::{InProgressGuard, ViewState, ViewStateMachine};

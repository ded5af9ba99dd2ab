//! # polls-core - Core Domain Types
//!
//! Foundation crate for LivePolls. Provides the poll/option domain model,
//! typed change events, error handling and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, uuid, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`model`)
//! - [`Poll`] - A poll with its ordered, locally attached options
//! - [`PollOption`] - One answer of a poll with its vote count
//! - [`PollId`], [`OptionId`] - UUID-backed identities
//!
//! ### Events (`events`)
//! - [`Channel`] - The `polls` / `options` realtime channels
//! - [`ChangeKind`] - Insert or update
//! - [`Change`], [`PollChange`], [`OptionChange`] - Decoded change events
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use polls_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod prelude;

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use events::{Change, ChangeKind, Channel, OptionChange, PollChange};
pub use model::{OptionId, Poll, PollId, PollOption};

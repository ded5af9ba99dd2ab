//! Application error types with rich context

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Remote Store Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Remote store error: {message}")]
    Store { message: String },

    #[error("No {entity} found with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Duplicate {entity} id {id}")]
    Duplicate { entity: &'static str, id: String },

    #[error("Invalid poll: {message}")]
    InvalidPoll { message: String },

    // ─────────────────────────────────────────────────────────────
    // Realtime Channel Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Realtime transport error: {message}")]
    Transport { message: String },

    #[error("Failed to subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Failed to decode {entity} change: {message}")]
    Decode {
        entity: &'static str,
        message: String,
    },

    #[error("Unsupported change type: {kind}")]
    UnsupportedChange { kind: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Engine Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Engine has been shut down")]
    EngineShutdown,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn duplicate(entity: &'static str, id: impl ToString) -> Self {
        Self::Duplicate {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_poll(message: impl Into<String>) -> Self {
        Self::InvalidPoll {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn subscribe(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Subscribe {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            entity,
            message: message.into(),
        }
    }

    pub fn unsupported_change(kind: impl Into<String>) -> Self {
        Self::UnsupportedChange { kind: kind.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Everything the sync engine reports at runtime is recoverable: the
    /// caller may simply re-invoke the operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Store { .. }
                | Error::NotFound { .. }
                | Error::Duplicate { .. }
                | Error::Transport { .. }
                | Error::Subscribe { .. }
                | Error::Decode { .. }
                | Error::UnsupportedChange { .. }
        )
    }

    /// Check if this error should trigger application exit
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::EngineShutdown)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::store("connection reset");
        assert_eq!(err.to_string(), "Remote store error: connection reset");

        let err = Error::decode("poll", "missing field `name`");
        assert_eq!(
            err.to_string(),
            "Failed to decode poll change: missing field `name`"
        );
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(Error::store("timeout").is_recoverable());
        assert!(Error::transport("socket closed").is_recoverable());
        assert!(Error::unsupported_change("DELETE").is_recoverable());
        assert!(!Error::EngineShutdown.is_recoverable());
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::EngineShutdown.is_fatal());
        assert!(!Error::store("timeout").is_fatal());
        assert!(!Error::decode("option", "bad count").is_fatal());
    }

    #[test]
    fn test_not_found_and_duplicate_mention_id() {
        let err = Error::not_found("option", "abc");
        assert!(err.to_string().contains("abc"));

        let err = Error::duplicate("poll", "p-1");
        assert!(err.to_string().contains("p-1"));
        assert!(err.to_string().contains("poll"));
    }

    #[test]
    fn test_context_preserves_error() {
        let result: std::result::Result<(), Error> = Err(Error::store("boom"));
        let err = result.context("fetching polls").unwrap_err();
        assert!(matches!(err, Error::Store { .. }));
    }
}

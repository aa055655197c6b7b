//! Cache Errors
//!
//! Typed failures of the remote cache path. None of these reach callers of
//! the façade except [`CacheError::Serialization`] from `set`; everything else
//! is recovered by falling back to the local store.

use std::time::Duration;
use thiserror::Error;

/// Reply text Redis sends when `maxclients` is exhausted.
pub const MAX_CLIENTS_SIGNATURE: &str = "max number of clients reached";

/// Errors produced by the remote cache path
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The remote service refused the connection because its client limit is exhausted
    #[error("remote cache rejected connection, max number of clients reached: {0}")]
    MaxClients(String),

    /// A single connect attempt exceeded the configured timeout
    #[error("timed out connecting to remote cache after {0:?}")]
    ConnectTimeout(Duration),

    /// Connection-level failure (refused, dropped, I/O)
    #[error("remote cache connection error: {0}")]
    Connection(String),

    /// The server answered a command with an error reply
    #[error("remote cache command failed: {0}")]
    Command(String),

    /// A value could not be encoded for storage
    #[error("failed to serialize cache value: {0}")]
    Serialization(String),
}

impl CacheError {
    /// Classify a raw error message coming from a client library.
    ///
    /// Used only where the client exposes no structured code for the
    /// resource-exhaustion condition.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_max_clients_message(&message) {
            Self::MaxClients(message)
        } else {
            Self::Connection(message)
        }
    }

    /// Whether this is the resource-exhaustion signature that drives the circuit breaker
    #[must_use]
    pub fn is_max_clients(&self) -> bool {
        matches!(self, Self::MaxClients(_))
    }

    /// Whether the error means the connection itself is unusable
    #[must_use]
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            Self::MaxClients(_) | Self::ConnectTimeout(_) | Self::Connection(_)
        )
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Case-insensitive match on the max-clients reply text
#[must_use]
pub fn is_max_clients_message(message: &str) -> bool {
    message
        .to_ascii_lowercase()
        .contains(MAX_CLIENTS_SIGNATURE)
}

/// Result alias for remote cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_clients_signature_detection() {
        assert!(is_max_clients_message("ERR max number of clients reached"));
        assert!(is_max_clients_message("ERR Max Number Of Clients Reached"));
        assert!(!is_max_clients_message("Connection refused (os error 111)"));
    }

    #[test]
    fn test_from_message_classification() {
        assert!(CacheError::from_message("ERR max number of clients reached").is_max_clients());

        let generic = CacheError::from_message("broken pipe");
        assert!(!generic.is_max_clients());
        assert!(generic.is_connection_level());
    }

    #[test]
    fn test_command_errors_are_not_connection_level() {
        let err = CacheError::Command("WRONGTYPE Operation against a key".to_string());
        assert!(!err.is_connection_level());
        assert!(!CacheError::Serialization("bad".to_string()).is_connection_level());
    }
}

// Error types for the relay subsystem

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, BeaconError>;

/// Errors that can occur while moving events through the relay
///
/// The propagation rule across the codebase: failures local to one item,
/// key or poll tick are contained where they occur; reporting-channel
/// failures never fail the task they are reporting on.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// Transport or timeout talking to the relay store. Callers treat the
    /// operation as a no-op - never as "session does not exist".
    #[error("relay store unavailable: {0}")]
    StoreUnavailable(String),

    /// Marker absent when a producer tried to publish. A normal branch
    /// ("receiver gone"), not a failure.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Inbox entry that does not decode as an event. Skipped with a
    /// warning by the poll loop.
    #[error("malformed inbox payload: {0}")]
    MalformedPayload(String),

    /// The external message-dispatch call failed for one item
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BeaconError {
    /// Create a store-unavailable error
    pub fn store(msg: impl Into<String>) -> Self {
        BeaconError::StoreUnavailable(msg.into())
    }

    /// Create a session-not-found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        BeaconError::SessionNotFound(session_id.into())
    }

    /// Create a malformed-payload error
    pub fn malformed(msg: impl Into<String>) -> Self {
        BeaconError::MalformedPayload(msg.into())
    }

    /// Create a dispatch error
    pub fn dispatch(msg: impl Into<String>) -> Self {
        BeaconError::Dispatch(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        BeaconError::Config(msg.into())
    }
}

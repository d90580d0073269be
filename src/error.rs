//! Socket error types
//!
//! Errors raised synchronously to the caller. Simulated transport failures
//! (nobody listening, handshake rejected) never show up here; they are
//! delivered as `error` + `close` events on the socket instead.

use thiserror::Error;

/// Errors that can occur when constructing or driving simulated sockets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    /// Missing or malformed constructor argument
    #[error("Failed to construct '{kind}': {reason}")]
    Construction {
        /// The type being constructed (e.g. "WebSocket")
        kind: &'static str,
        /// What was wrong with the arguments
        reason: String,
    },

    /// Malformed value passed to an operation (e.g. oversized close reason)
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Operation is not valid in the socket's current ready state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Operation was given a value it may not use (e.g. reserved close code)
    #[error("Invalid access: {0}")]
    InvalidAccess(String),

    /// A server is already bound to this URL
    #[error("Address in use: {0}")]
    AddressInUse(String),

    /// No server is listening on the URL
    #[error("No server listening at {0}")]
    NoServer(String),

    /// Deferred delivery needs a tokio runtime on the calling thread
    #[error("No tokio runtime available for deferred delivery")]
    NoRuntime,

    /// No WebSocket implementation is installed in the ambient slot
    #[error("No WebSocket binding installed")]
    NoBinding,
}

/// Result type alias for socket operations
pub type SocketResult<T> = Result<T, SocketError>;

//! Typed errors for rendering sessions.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a rendering engine or one of its sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The browser process could not be started
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Navigation to a URL failed
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// No element matched the selector before the timeout elapsed
    #[error("timed out after {timeout:?} waiting for `{selector}`")]
    Timeout { selector: String, timeout: Duration },

    /// The element is no longer attached to the current document
    #[error("stale element reference: {0}")]
    StaleElement(String),

    /// The selector could not be evaluated
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// DevTools protocol or driver failure
    #[error("browser protocol error: {0}")]
    Protocol(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The session was already torn down
    #[error("session closed")]
    Closed,
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

//! Typed errors for the scrape pipeline.

use browser_session::SessionError;
use thiserror::Error;

/// Errors from the job store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The store refused the write (used by in-memory stores)
    #[error("insert rejected for {key}: {reason}")]
    Rejected { key: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that end a scrape cycle early.
///
/// Records committed before the error stand; the cycle is reported as
/// aborted and the scheduler carries on.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("could not open rendering session: {0}")]
    SessionAcquisition(#[source] SessionError),

    #[error("could not open store session: {0}")]
    StoreAcquisition(#[source] StoreError),

    #[error("initial navigation failed: {0}")]
    Navigation(#[source] SessionError),

    #[error("page {page} did not render its listings: {source}")]
    PageLoadTimeout {
        page: u32,
        #[source]
        source: SessionError,
    },

    #[error("card lookup on page {page} failed: {source}")]
    CardLookup {
        page: u32,
        #[source]
        source: SessionError,
    },

    #[error("cycle panicked: {0}")]
    Panicked(String),
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Best-effort message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A CSS selector that does not parse.
#[derive(Debug, Error)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct InvalidSelector {
    pub selector: String,
    pub reason: String,
}

//! Job storage.
//!
//! A scrape cycle opens one [`StoreSession`] at start and closes it at the
//! end; nothing holds a connection between cycles.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{DedupKey, JobId, NewJob};

pub mod postgres;
pub use postgres::{PgJobStore, PgStoreSession};

/// Hands out store sessions.
#[async_trait]
pub trait JobStore: Send + Sync {
    type Session: StoreSession;

    async fn open_session(&self) -> StoreResult<Self::Session>;
}

/// A connection owned by a single scrape cycle.
#[async_trait]
pub trait StoreSession: Send + Sized {
    /// Whether a row with exactly this `(title, company)` exists.
    async fn exists(&mut self, key: &DedupKey) -> StoreResult<bool>;

    /// Insert one posting and commit before returning.
    async fn insert(&mut self, job: &NewJob) -> StoreResult<JobId>;

    /// Release the underlying connection.
    async fn close(self);
}

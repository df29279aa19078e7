//! Deduplication gate.
//!
//! The `jobs` table has no unique constraint on `(title, company)`, so this
//! check is the only thing keeping duplicates out. It must run on the same
//! session, immediately before the insert, and is only race-free because at
//! most one cycle runs at a time.

use crate::error::StoreResult;
use crate::models::NewJob;
use crate::store::StoreSession;

/// Whether a candidate may proceed to persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    New,
    Duplicate,
}

pub async fn admit<S: StoreSession>(session: &mut S, candidate: &NewJob) -> StoreResult<Admission> {
    if session.exists(&candidate.key()).await? {
        Ok(Admission::Duplicate)
    } else {
        Ok(Admission::New)
    }
}

//! Persistence writer.
//!
//! Each admitted posting gets its own insert and commit, so a crash later in
//! the cycle never loses records already written.

use tracing::{error, info};

use crate::error::StoreError;
use crate::models::{JobId, NewJob};
use crate::store::StoreSession;

#[derive(Debug)]
pub enum PersistOutcome {
    Committed(JobId),
    Failed(StoreError),
}

impl PersistOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, PersistOutcome::Committed(_))
    }
}

/// Insert and commit one posting. Failures are logged and returned, never raised.
pub async fn persist<S: StoreSession>(session: &mut S, job: &NewJob) -> PersistOutcome {
    match session.insert(job).await {
        Ok(id) => {
            info!(job_id = %id, title = %job.title, company = %job.company, "Saved job");
            PersistOutcome::Committed(id)
        }
        Err(e) => {
            error!(
                title = %job.title,
                company = %job.company,
                error = %e,
                "Failed to save job"
            );
            PersistOutcome::Failed(e)
        }
    }
}

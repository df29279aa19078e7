//! Testing utilities.
//!
//! [`MemoryJobStore`] stands in for Postgres in pipeline tests. Pair it with
//! [`browser_session::testing::FixtureEngine`] to run whole scrape cycles
//! without a browser or database.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{StoreError, StoreResult};
use crate::models::{DedupKey, JobId, JobRecord, NewJob};
use crate::store::{JobStore, StoreSession};

#[derive(Default)]
struct MemoryState {
    rows: RwLock<Vec<JobRecord>>,
    rejected_titles: RwLock<HashSet<String>>,
    panicking_titles: RwLock<HashSet<String>>,
    unavailable: AtomicBool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    insert_attempts: AtomicUsize,
}

/// In-memory job table with failure injection.
///
/// Clones share the same rows, so a test can keep a handle while the cycle
/// owns another.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    state: Arc<MemoryState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the table.
    pub fn with_jobs(self, jobs: impl IntoIterator<Item = NewJob>) -> Self {
        for job in jobs {
            self.push(&job);
        }
        self
    }

    /// Reject every insert whose title equals `title`.
    pub fn rejecting_title(self, title: impl Into<String>) -> Self {
        self.state
            .rejected_titles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(title.into());
        self
    }

    /// Panic inside `insert` for this title, simulating a bug mid-cycle.
    pub fn panicking_title(self, title: impl Into<String>) -> Self {
        self.state
            .panicking_titles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(title.into());
        self
    }

    /// Make `open_session` fail.
    pub fn unavailable(self) -> Self {
        self.state.unavailable.store(true, Ordering::SeqCst);
        self
    }

    pub fn jobs(&self) -> Vec<JobRecord> {
        self.state.rows.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.state.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn titles(&self) -> Vec<String> {
        self.jobs().into_iter().map(|j| j.title).collect()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn insert_attempts(&self) -> usize {
        self.state.insert_attempts.load(Ordering::SeqCst)
    }

    fn push(&self, job: &NewJob) -> JobId {
        let mut rows = self.state.rows.write().unwrap_or_else(PoisonError::into_inner);
        let id = JobId(rows.len() as i32 + 1);
        rows.push(JobRecord {
            id,
            title: job.title.clone(),
            company: job.company.clone(),
            location: Some(job.location.clone()),
            job_type: None,
            tags: Some(job.tags.clone()),
            date_posted: Some(job.date_posted.clone()),
            link: Some(job.link.clone()),
            logo: Some(job.logo.clone()),
            created_at: Utc::now(),
        });
        id
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    type Session = MemoryStoreSession;

    async fn open_session(&self) -> StoreResult<MemoryStoreSession> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryStoreSession {
            store: self.clone(),
        })
    }
}

pub struct MemoryStoreSession {
    store: MemoryJobStore,
}

#[async_trait]
impl StoreSession for MemoryStoreSession {
    async fn exists(&mut self, key: &DedupKey) -> StoreResult<bool> {
        Ok(self
            .store
            .state
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|row| row.key() == *key))
    }

    async fn insert(&mut self, job: &NewJob) -> StoreResult<JobId> {
        self.store
            .state
            .insert_attempts
            .fetch_add(1, Ordering::SeqCst);

        let panics = self
            .store
            .state
            .panicking_titles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&job.title);
        if panics {
            panic!("injected panic inserting {}", job.key());
        }

        if self
            .store
            .state
            .rejected_titles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&job.title)
        {
            return Err(StoreError::Rejected {
                key: job.key().to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(self.store.push(job))
    }

    async fn close(self) {
        self.store.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A minimal valid posting for tests.
pub fn new_job(title: &str, company: &str) -> NewJob {
    NewJob {
        title: title.to_string(),
        company: company.to_string(),
        location: String::new(),
        tags: String::new(),
        date_posted: String::new(),
        link: String::new(),
        logo: String::new(),
    }
}

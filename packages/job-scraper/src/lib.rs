//! Job listings scraper.
//!
//! Crawls a client-rendered job board with a headless browser, extracts one
//! posting per listing card, skips postings already stored under the same
//! `(title, company)`, and commits each new posting as soon as it is found.
//! A scheduler repeats the crawl on a fixed interval.
//!
//! # Modules
//!
//! - [`pipeline`] - extractor, dedup gate, writer, pagination, cycle
//! - [`scheduler`] - recurring, failure-isolated cycle runner
//! - [`store`] - storage traits and the Postgres implementation
//! - [`db`] - database creation and migrations
//! - [`testing`] - in-memory store for tests

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod testing;

pub use config::{Config, SchedulerConfig, ScrapeConfig};
pub use error::{CycleError, InvalidSelector, StoreError};
pub use models::{DedupKey, JobId, JobRecord, NewJob};
pub use pipeline::{CycleOutcome, CycleReport, ScrapeCycle};
pub use scheduler::{CycleRunner, Firing, Scheduler};
pub use store::{JobStore, PgJobStore, StoreSession};

pub mod job;

pub use job::{DedupKey, JobId, JobRecord, NewJob};

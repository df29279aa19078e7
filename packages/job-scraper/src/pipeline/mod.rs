//! The scrape-and-ingest pipeline.
//!
//! ```text
//! ScrapeCycle
//!     │
//!     ├─► Paginator ⇄ RenderSession (page 1 .. exhausted)
//!     │       └─► CardExtractor (one card -> NewJob | skip)
//!     │               └─► dedup::admit (title, company)
//!     │                       └─► writer::persist (commit per record)
//!     └─► CycleReport
//! ```

pub mod cycle;
pub mod dedup;
pub mod extractor;
pub mod pagination;
pub mod writer;

pub use cycle::{CycleOutcome, CycleReport, ScrapeCycle};
pub use dedup::Admission;
pub use extractor::{absolutize_link, CardExtraction, CardExtractor, CardSelectors, SkipReason};
pub use pagination::{ExhaustionReason, PaginationState, Paginator};
pub use writer::PersistOutcome;

//! Crawl queue infrastructure: the job model and the backing store.
//!
//! The store is the only shared mutable resource in the system. Worker
//! processes never coordinate directly; mutual exclusion over a job is
//! entirely the store's atomic claim, and all progress/result visibility
//! flows through it.
//!
//! ```text
//! enqueue ──► waiting ──claim──► active ──complete──► completed
//!                                  │
//!                                  ├──fail──────────► failed
//!                                  └──force_release─► failed (recovery only)
//! ```

mod job;
mod memory;
mod postgres;
mod store;

pub use job::{
    CrawlJob, CrawlMode, CrawlPayload, CrawlProgress, CrawlerOptions, Document, DocumentMetadata,
    JobError, JobErrorCode, JobResult, JobState, PARTIAL_DOCS_CAP,
};
pub use memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;
pub use store::{JobStore, RecoveryStore};

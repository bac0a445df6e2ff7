//! Job records: lifecycle, storage and statistics.
//!
//! - `Job`: one unit of AI work with its state machine (`mark_*` transitions)
//! - `JobStore`: atomic, single-record state changes (in-memory or Postgres)

pub mod postgres;
pub mod store;
pub mod types;

pub use postgres::PostgresJobStore;
pub use store::{INTERRUPTED_ERROR, InMemoryJobStore, JobStats, JobStore, JobStoreError, RecoveredJobs};
pub use types::{Job, JobFilter, JobStatus, JobTargets, TransitionError};

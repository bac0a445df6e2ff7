//! Narrow seams to collaborators that live outside the job engine.
//!
//! Each trait comes with an in-memory implementation for tests and local dev.

pub mod activity;
pub mod storage;
pub mod targets;

pub use activity::{
    ActivityError, ActivityEvent, ActivityKind, ActivitySink, InMemoryActivitySink,
    TracingActivitySink,
};
pub use storage::{InMemoryObjectStorage, ObjectStorage, StorageError, StoredObject};
pub use targets::{InMemoryTargetStore, TargetResourceStore, TargetStoreError};

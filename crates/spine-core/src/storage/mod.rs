//! Storage abstraction (spec.md §4.1) plus the claim mutex (§4.2).
//!
//! `JobStore` decouples the state machine from the backend, the way the
//! teacher's `IssueStore` trait decouples issue persistence from its
//! `JsonFileStorage`/`InMemoryStorage` implementations.

pub mod json;
pub mod lock;
pub mod memory;

pub use json::JsonJobStore;
pub use memory::InMemoryJobStore;

use crate::domain::{Event, Job};
use crate::error::SpineError;

/// A storage backend for job records and their event logs, plus the per-job
/// claim mutex used to serialize state transitions.
pub trait JobStore: Clone + Send + Sync + 'static {
    /// RAII guard returned by `acquire_lock`; releases the lock on drop.
    type Lock: Send;

    /// Create the backend's on-disk (or in-memory) layout. Idempotent.
    fn init(&self) -> Result<(), SpineError>;

    /// Acquire the per-job claim mutex (spec.md §4.2). Non-blocking: returns
    /// `SpineError::Locked` immediately on contention.
    fn acquire_lock(&self, id: &str) -> Result<Self::Lock, SpineError>;

    /// Read a job record. `SpineError::NotFound` if it does not exist.
    fn read(&self, id: &str) -> Result<Job, SpineError>;

    /// Atomically persist a job record (write-temp, rename-over-target).
    fn write_atomic(&self, job: &Job) -> Result<(), SpineError>;

    /// Append one event line to the job's event log.
    fn append_event(&self, id: &str, event: &Event) -> Result<(), SpineError>;

    /// Enumerate every job record. O(n); no index is maintained.
    fn list(&self) -> Result<Vec<Job>, SpineError>;
}

//! In-memory `JobStore` for fast tests, grounded in the teacher's
//! `InMemoryStorage` — generalized from `Rc<RefCell<_>>` to `Arc<Mutex<_>>`
//! since this backend must be `Send + Sync` to back an axum router in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{Event, Job};
use crate::error::SpineError;
use crate::storage::JobStore;

/// Per-id flag standing in for the claim mutex: `compare_exchange` acquires,
/// `Drop` releases. Same non-blocking, single-attempt contract as the
/// file-backed lock (spec.md §4.2).
pub struct MemoryLockGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for MemoryLockGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    events: Arc<Mutex<HashMap<String, Vec<Event>>>>,
    locks: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    type Lock = MemoryLockGuard;

    fn init(&self) -> Result<(), SpineError> {
        Ok(())
    }

    fn acquire_lock(&self, id: &str) -> Result<Self::Lock, SpineError> {
        let flag = self
            .locks
            .lock()
            .expect("lock table mutex poisoned")
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();

        match flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => Ok(MemoryLockGuard { flag }),
            Err(_) => Err(SpineError::Locked),
        }
    }

    fn read(&self, id: &str) -> Result<Job, SpineError> {
        self.jobs
            .lock()
            .expect("job table mutex poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| SpineError::NotFound(id.to_string()))
    }

    fn write_atomic(&self, job: &Job) -> Result<(), SpineError> {
        self.jobs
            .lock()
            .expect("job table mutex poisoned")
            .insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn append_event(&self, id: &str, event: &Event) -> Result<(), SpineError> {
        self.events
            .lock()
            .expect("event table mutex poisoned")
            .entry(id.to_string())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<Job>, SpineError> {
        Ok(self
            .jobs
            .lock()
            .expect("job table mutex poisoned")
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_contention_is_rejected_without_blocking() {
        let store = InMemoryJobStore::new();
        let _held = store.acquire_lock("job1").unwrap();
        assert_eq!(store.acquire_lock("job1").unwrap_err(), SpineError::Locked);
    }

    #[test]
    fn lock_releases_on_drop() {
        let store = InMemoryJobStore::new();
        {
            let _held = store.acquire_lock("job1").unwrap();
        }
        assert!(store.acquire_lock("job1").is_ok());
    }
}

//! The job state machine (spec.md §4.4): every operation that mutates a job
//! runs under the per-job claim mutex, reads the current record, validates
//! the transition, and writes the new record atomically before releasing
//! the lock.

use serde_json::Value;

use crate::auth::{can_access, is_owner_or_head};
use crate::domain::{
    now_millis, Comment, CreateJobInput, Event, EventKind, Job, JobFilter, Role, Status,
};
use crate::error::{Result, SpineError};
use crate::storage::JobStore;

/// Tunables the engine needs that aren't part of any single request
/// (spec.md §6.3: `LeaseDuration`, `DefaultMaxAttempts`).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub lease_duration: chrono::Duration,
    pub default_max_attempts: u32,
}

/// Owns a `JobStore` and enforces every invariant in spec.md §3–§4 on top of
/// it. Cheap to clone (the store itself is the only state, and stores are
/// `Clone`).
#[derive(Clone)]
pub struct JobEngine<S: JobStore> {
    store: S,
    config: EngineConfig,
}

impl<S: JobStore> JobEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Result<Self> {
        store.init()?;
        Ok(Self { store, config })
    }

    /// `create` (head-only; role is checked by the caller before reaching here
    /// — see spec.md §6.1, `POST /jobs` is head-only).
    pub fn create(&self, input: CreateJobInput) -> Result<Job> {
        let now = now_millis();
        let job = Job {
            id: nanoid::nanoid!(21),
            target: input.target,
            status: Status::Queued,
            created_at: now,
            updated_at: now,
            created_by: Role::Head.canonical_name().to_string(),
            claimed_by: None,
            lease_until: None,
            attempts: 0,
            max_attempts: input.max_attempts.unwrap_or(self.config.default_max_attempts),
            spec: input.spec,
            meta: input.meta,
            comments: Vec::new(),
            progress: None,
            result: None,
            error: None,
            release_reason: None,
        };
        self.store.write_atomic(&job)?;
        self.store
            .append_event(&job.id, &Event::new(EventKind::Created, job.created_by.clone()))?;
        Ok(job)
    }

    /// `list(role, filters)`, ordered by `createdAt` ascending.
    pub fn list(&self, role: Role, filter: &JobFilter) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .store
            .list()?
            .into_iter()
            .filter(|j| can_access(role, j) && filter.matches(j))
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    /// `get(role, id)`.
    pub fn get(&self, role: Role, id: &str) -> Result<Job> {
        let job = self.store.read(id)?;
        if !can_access(role, &job) {
            return Err(SpineError::Forbidden);
        }
        Ok(job)
    }

    /// `claim(role, id)` — workers only; the caller enforces the role
    /// restriction (spec.md §6.1: `POST /jobs/:id/claim` is claws-only).
    pub fn claim(&self, role: Role, id: &str) -> Result<Job> {
        let _guard = self.store.acquire_lock(id)?;
        let mut job = self.store.read(id)?;

        if !can_access(role, &job) {
            return Err(SpineError::Forbidden);
        }

        // Design note (spec.md §9, Open Question): a running job is blocked
        // for claim purposes even if its lease has already expired — only
        // the reaper transitions it back to `queued`. Claim never reclaims
        // inline.
        if job.status != Status::Queued {
            return Err(if job.status.is_terminal() {
                SpineError::TerminalStatus
            } else {
                SpineError::AlreadyClaimed
            });
        }

        let now = now_millis();

        if job.attempts >= job.max_attempts {
            job.status = Status::Dead;
            job.claimed_by = None;
            job.lease_until = None;
            job.updated_at = now;
            self.store.write_atomic(&job)?;
            self.store.append_event(
                &job.id,
                &Event::new(EventKind::Dead, role.canonical_name())
                    .with("reason", "max_attempts_reached"),
            )?;
            return Err(SpineError::MaxAttemptsReached);
        }

        job.status = Status::Running;
        job.claimed_by = Some(role.canonical_name().to_string());
        job.lease_until = Some(now + self.config.lease_duration);
        job.attempts += 1;
        job.updated_at = now;

        self.store.write_atomic(&job)?;
        self.store
            .append_event(&job.id, &Event::new(EventKind::Claimed, role.canonical_name()))?;
        Ok(job)
    }

    /// `heartbeat(role, id, {progress?})`.
    pub fn heartbeat(&self, role: Role, id: &str, progress: Option<Value>) -> Result<Job> {
        let _guard = self.store.acquire_lock(id)?;
        let mut job = self.store.read(id)?;

        self.check_owned_running(role, &job)?;

        let now = now_millis();
        job.lease_until = Some(now + self.config.lease_duration);
        job.updated_at = now;
        if let Some(p) = progress {
            job.progress = Some(p);
        }

        self.store.write_atomic(&job)?;
        self.store
            .append_event(&job.id, &Event::new(EventKind::Heartbeat, role.canonical_name()))?;
        Ok(job)
    }

    /// `complete(role, id, {result?})`. `claimedBy` is deliberately left set —
    /// it becomes the audit trail of who finished the job (spec.md §9).
    pub fn complete(&self, role: Role, id: &str, result: Option<Value>) -> Result<Job> {
        let _guard = self.store.acquire_lock(id)?;
        let mut job = self.store.read(id)?;

        self.check_owned_running(role, &job)?;

        job.status = Status::Done;
        job.result = Some(result.unwrap_or(Value::Null));
        job.error = None;
        job.lease_until = None;
        job.updated_at = now_millis();

        self.store.write_atomic(&job)?;
        self.store
            .append_event(&job.id, &Event::new(EventKind::Completed, role.canonical_name()))?;
        Ok(job)
    }

    /// `fail(role, id, {error?, requeue?})`. Default for `requeue` is `true`.
    pub fn fail(
        &self,
        role: Role,
        id: &str,
        error: Option<String>,
        requeue: Option<bool>,
    ) -> Result<Job> {
        let _guard = self.store.acquire_lock(id)?;
        let mut job = self.store.read(id)?;

        self.check_owned_running(role, &job)?;

        let has_retries_left = job.attempts < job.max_attempts;
        let requeued = requeue != Some(false) && has_retries_left;

        if requeued {
            job.status = Status::Queued;
        } else if job.attempts >= job.max_attempts {
            job.status = Status::Dead;
        } else {
            job.status = Status::Failed;
        }
        job.claimed_by = None;
        job.lease_until = None;
        job.error = error;
        job.updated_at = now_millis();

        self.store.write_atomic(&job)?;
        self.store.append_event(
            &job.id,
            &Event::new(EventKind::Failed, role.canonical_name())
                .with("requeued", requeued)
                .with("attempts", job.attempts),
        )?;
        Ok(job)
    }

    /// `release(role, id, {reason?})`. Attempts are unchanged.
    pub fn release(&self, role: Role, id: &str, reason: Option<String>) -> Result<Job> {
        let _guard = self.store.acquire_lock(id)?;
        let mut job = self.store.read(id)?;

        self.check_owned_running(role, &job)?;

        job.status = Status::Queued;
        job.claimed_by = None;
        job.lease_until = None;
        if let Some(reason) = reason {
            job.release_reason = Some(reason);
        }
        job.updated_at = now_millis();

        self.store.write_atomic(&job)?;
        self.store
            .append_event(&job.id, &Event::new(EventKind::Released, role.canonical_name()))?;
        Ok(job)
    }

    /// `comment(role, id, {text})`. Requires `canAccess` only.
    pub fn comment(&self, role: Role, id: &str, text: String) -> Result<Job> {
        let _guard = self.store.acquire_lock(id)?;
        let mut job = self.store.read(id)?;

        if !can_access(role, &job) {
            return Err(SpineError::Forbidden);
        }

        let now = now_millis();
        job.comments.push(Comment {
            t: now,
            by: role.canonical_name().to_string(),
            text: text.clone(),
        });
        job.updated_at = now;

        self.store.write_atomic(&job)?;
        self.store.append_event(
            &job.id,
            &Event::new(EventKind::Comment, role.canonical_name()).with("text", text),
        )?;
        Ok(job)
    }

    /// Shared precondition for heartbeat/complete/fail/release: status must
    /// be `running`, then ownership, then access — in that order, matching
    /// spec.md §4.4's precondition list. In practice `canAccess` can never
    /// fail once `isOwnerOrHead` passed (a job's target never changes after
    /// claim), so this is a defensive double-check, not a reachable branch.
    fn check_owned_running(&self, role: Role, job: &Job) -> Result<()> {
        if job.status != Status::Running {
            return Err(SpineError::NotRunning);
        }
        if !is_owner_or_head(role, job) {
            return Err(SpineError::NotOwner);
        }
        if !can_access(role, job) {
            return Err(SpineError::Forbidden);
        }
        Ok(())
    }

    /// One lease-reaper sweep (spec.md §4.5). Returns counts for logging.
    pub fn reap_once(&self) -> ReapSummary {
        let mut summary = ReapSummary::default();

        let jobs = match self.store.list() {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::warn!(error = %e, "reaper: failed to list jobs, skipping this pass");
                return summary;
            }
        };

        let now = now_millis();
        for job in jobs {
            if job.status != Status::Running {
                continue;
            }
            let Some(lease_until) = job.lease_until else {
                continue;
            };
            if lease_until > now {
                continue;
            }
            self.reap_one(&job.id, &mut summary);
        }

        summary
    }

    fn reap_one(&self, id: &str, summary: &mut ReapSummary) {
        let guard = match self.store.acquire_lock(id) {
            Ok(guard) => guard,
            Err(_) => {
                summary.skipped_contended += 1;
                return;
            }
        };

        let mut job = match self.store.read(id) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(job_id = id, error = %e, "reaper: failed to re-read job, skipping");
                return;
            }
        };

        // Re-check under the lock: another caller may have already
        // completed/released/failed the job between the scan and now.
        let now = now_millis();
        let still_expired =
            job.status == Status::Running && job.lease_until.is_some_and(|lu| lu <= now);
        if !still_expired {
            return;
        }

        if job.attempts >= job.max_attempts {
            job.status = Status::Dead;
            job.claimed_by = None;
            job.lease_until = None;
            job.updated_at = now;
            if self.store.write_atomic(&job).is_ok() {
                let _ = self.store.append_event(
                    id,
                    &Event::new(EventKind::Dead, "reaper")
                        .with("reason", "lease_expired_max_attempts"),
                );
                summary.reaped_dead += 1;
            }
        } else {
            job.status = Status::Queued;
            job.claimed_by = None;
            job.lease_until = None;
            job.updated_at = now;
            if self.store.write_atomic(&job).is_ok() {
                let _ = self
                    .store
                    .append_event(id, &Event::new(EventKind::Expired, "reaper"));
                summary.reaped_requeued += 1;
            }
        }

        drop(guard);
    }
}

/// Counts from one reaper pass, logged by the caller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapSummary {
    pub reaped_requeued: usize,
    pub reaped_dead: usize,
    pub skipped_contended: usize,
}

//! Core domain types: jobs, events, and the small enums that describe them.
//!
//! Mirrors the wire format in the spec: a job record is a flat JSON object,
//! an event is `{t, type, by, ..}` appended to a per-job log.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which worker class may claim a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    LeftClaw,
    RightClaw,
    Any,
}

/// The authenticated role behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Head,
    LeftClaw,
    RightClaw,
}

impl Role {
    /// The name stored in `claimedBy`/`createdBy`/event `by` fields for this role.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Role::Head => "head",
            Role::LeftClaw => "left-claw",
            Role::RightClaw => "right-claw",
        }
    }

    /// `true` for the two worker roles, `false` for head.
    pub fn is_claw(self) -> bool {
        !matches!(self, Role::Head)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Job lifecycle status. Transitions exclusively through `engine::JobEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Queued,
    Running,
    Done,
    Failed,
    Dead,
}

impl Status {
    /// Terminal statuses are sticky: no transition leads out of them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Failed | Status::Dead)
    }
}

/// One entry in a job's `comments` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub t: DateTime<Utc>,
    pub by: String,
    pub text: String,
}

/// A job record. Identified by `id`, owned exclusively by `engine::JobEngine`
/// transitions; nothing outside this crate should construct one with a status
/// inconsistent with the invariants in spec.md §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// 21-character URL-safe identifier, assigned at `create` and never reused.
    pub id: String,
    /// Which worker class may claim this job.
    pub target: Target,
    /// Current lifecycle status.
    pub status: Status,
    /// When the job was created.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// When the job record was last written.
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    /// Canonical role name of whoever created the job (always `"head"`).
    #[serde(rename = "createdBy")]
    pub created_by: String,
    /// Canonical role name of the current (or, after `complete`, the last) claimant.
    #[serde(rename = "claimedBy")]
    pub claimed_by: Option<String>,
    /// Deadline by which the claimant must heartbeat or close the job out.
    #[serde(rename = "leaseUntil")]
    pub lease_until: Option<DateTime<Utc>>,
    /// Number of claims granted so far.
    pub attempts: u32,
    /// Attempts allowed before the job is marked `dead` instead of retried.
    #[serde(rename = "maxAttempts")]
    pub max_attempts: u32,
    /// Free-form instruction payload for the worker.
    pub spec: String,
    /// Free-form key-value data supplied at creation.
    pub meta: Map<String, Value>,
    /// Comments appended by any role with access, oldest first.
    pub comments: Vec<Comment>,
    /// Latest progress payload reported via `heartbeat`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    /// Payload reported via `complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message reported via `fail`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Reason given for the most recent `release`.
    #[serde(rename = "releaseReason", skip_serializing_if = "Option::is_none")]
    pub release_reason: Option<String>,
}

/// Truncate a `DateTime<Utc>` to millisecond precision, matching the wire
/// format's `ISO-8601 UTC timestamps with millisecond precision`.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::parse_from_rfc3339(&now.to_rfc3339_opts(SecondsFormat::Millis, true))
        .expect("round-tripping our own rfc3339 output never fails")
        .with_timezone(&Utc)
}

/// Inputs accepted by `create`.
#[derive(Debug, Clone, Default)]
pub struct CreateJobInput {
    pub target: Target,
    pub spec: String,
    pub meta: Map<String, Value>,
    pub max_attempts: Option<u32>,
}

impl Default for Target {
    fn default() -> Self {
        Target::Any
    }
}

/// Filters accepted by `list`.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<Status>,
    pub target: Option<Target>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        let status_ok = match self.status {
            Some(s) => s == job.status,
            None => true,
        };
        let target_ok = match self.target {
            Some(t) => t == job.target,
            None => true,
        };
        status_ok && target_ok
    }
}

/// The kind of an appended event. Diagnostic only — never read back to drive
/// behavior (spec.md §2, §9: "the event log is advisory").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Claimed,
    Heartbeat,
    Completed,
    Failed,
    Released,
    Comment,
    Expired,
    Dead,
}

impl EventKind {
    fn wire_name(self) -> &'static str {
        match self {
            EventKind::Created => "job.created",
            EventKind::Claimed => "job.claimed",
            EventKind::Heartbeat => "job.heartbeat",
            EventKind::Completed => "job.completed",
            EventKind::Failed => "job.failed",
            EventKind::Released => "job.released",
            EventKind::Comment => "job.comment",
            EventKind::Expired => "job.expired",
            EventKind::Dead => "job.dead",
        }
    }
}

/// An append-only event record. `extra` carries kind-specific fields
/// (`reason`, `requeued`, `attempts`, ...) flattened into the JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// When the event was recorded.
    pub t: DateTime<Utc>,
    /// Dotted event name, e.g. `"job.claimed"`.
    #[serde(rename = "type")]
    pub kind_name: String,
    /// Canonical role name of whoever caused the event (`"reaper"` for sweep-originated ones).
    pub by: String,
    /// Kind-specific fields (`reason`, `requeued`, `attempts`, ...), flattened into the record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn new(kind: EventKind, by: impl Into<String>) -> Self {
        Self {
            t: now_millis(),
            kind_name: kind.wire_name().to_string(),
            by: by.into(),
            extra: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

//! Job coordination core for Spine: the state machine, lease/reaper
//! protocol, claim mutex, authorization mapper, and file-backed persistence
//! described in spec.md. HTTP framing lives in the `spine-server` crate.

pub mod auth;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod reaper;
pub mod storage;

pub use domain::{Comment, CreateJobInput, Event, EventKind, Job, JobFilter, Role, Status, Target};
pub use engine::{EngineConfig, JobEngine, ReapSummary};
pub use error::SpineError;

//! File-backed `JobStore`: one JSON file per job under `<data>/jobs/`, one
//! newline-delimited event log per job under `<data>/events/`.
//!
//! Grounded in the teacher's `JsonFileStorage` (temp-write + rename for
//! atomicity, append-mode writes for the log), generalized from a single
//! fixed `.tmp` suffix to a randomized one, since here concurrent non-lock-held
//! readers (`list`) must never even transiently see two writers' temp files
//! collide.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::domain::{Event, Job};
use crate::error::SpineError;
use crate::storage::lock::{self, ClaimGuard};
use crate::storage::JobStore;

const JOBS_DIR: &str = "jobs";
const EVENTS_DIR: &str = "events";
const BLOBS_DIR: &str = "blobs";

#[derive(Debug, Clone)]
pub struct JsonJobStore {
    jobs_dir: PathBuf,
    events_dir: PathBuf,
    blobs_dir: PathBuf,
}

impl JsonJobStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let root = data_dir.as_ref();
        Self {
            jobs_dir: root.join(JOBS_DIR),
            events_dir: root.join(EVENTS_DIR),
            blobs_dir: root.join(BLOBS_DIR),
        }
    }

    fn job_path(&self, id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{id}.json"))
    }

    fn event_log_path(&self, id: &str) -> PathBuf {
        self.events_dir.join(format!("{id}.jsonl"))
    }

    fn internal(e: anyhow::Error) -> SpineError {
        SpineError::Internal(format!("{e:#}"))
    }
}

impl JobStore for JsonJobStore {
    type Lock = ClaimGuard;

    fn init(&self) -> Result<(), SpineError> {
        for dir in [&self.jobs_dir, &self.events_dir, &self.blobs_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))
                .map_err(Self::internal)?;
        }
        Ok(())
    }

    fn acquire_lock(&self, id: &str) -> Result<Self::Lock, SpineError> {
        lock::acquire(&self.jobs_dir, id)
    }

    fn read(&self, id: &str) -> Result<Job, SpineError> {
        let path = self.job_path(id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SpineError::NotFound(id.to_string()))
            }
            Err(e) => {
                return Err(Self::internal(
                    anyhow::Error::new(e).context(format!("reading {}", path.display())),
                ))
            }
        };
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))
            .map_err(Self::internal)
    }

    fn write_atomic(&self, job: &Job) -> Result<(), SpineError> {
        let path = self.job_path(&job.id);
        let json = serde_json::to_string_pretty(job)
            .context("serializing job")
            .map_err(Self::internal)?;

        let temp_path = self
            .jobs_dir
            .join(format!("{}.json.tmp.{}", job.id, nanoid::nanoid!(8)));
        fs::write(&temp_path, json)
            .with_context(|| format!("writing {}", temp_path.display()))
            .map_err(Self::internal)?;
        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Self::internal(
                anyhow::Error::new(e).context(format!("renaming into {}", path.display())),
            )
        })
    }

    fn append_event(&self, id: &str, event: &Event) -> Result<(), SpineError> {
        let path = self.event_log_path(id);
        let mut line = serde_json::to_string(event)
            .context("serializing event")
            .map_err(Self::internal)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))
            .map_err(Self::internal)?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to {}", path.display()))
            .map_err(Self::internal)
    }

    fn list(&self) -> Result<Vec<Job>, SpineError> {
        let entries = match fs::read_dir(&self.jobs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Self::internal(
                    anyhow::Error::new(e).context("listing jobs directory"),
                ))
            }
        };

        let mut jobs = Vec::new();
        for entry in entries {
            let entry = entry
                .context("reading directory entry")
                .map_err(Self::internal)?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            // Canonical records end in exactly ".json" — reject ".json.tmp.*"
            // and ".lock" companions (spec.md §4.1).
            let Some(id) = name.strip_suffix(".json") else {
                continue;
            };
            match self.read(id) {
                Ok(job) => jobs.push(job),
                Err(SpineError::NotFound(_)) => continue, // raced with a delete/rename
                Err(e) => {
                    tracing::warn!(job_id = id, error = %e, "skipping unreadable job record");
                }
            }
        }
        Ok(jobs)
    }
}

// src/store/mod.rs

//! Persistent adjacency storage for job DAGs.
//!
//! The [`AdjacencyStore`] trait is the authoritative copy of every job and
//! every `runs-before` edge of one workflow [`Session`]. In-memory views
//! (see [`crate::dag::JobDag`]) are always re-derived from it.
//!
//! - [`memory::MemoryStore`] keeps everything in process memory.
//! - [`file::JsonFileStore`] persists one JSON document per session and
//!   survives process crashes.
//!
//! Every operation returns `Ok(changed)`; `Err` means the store is unusable
//! and is fatal to the run. Callers never retry.

pub mod file;
pub mod memory;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::job::{Job, JobId, JobState};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Explicit store handle for one workflow instance.
///
/// Two sessions against the same backing location never observe each
/// other's jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Session {
    pub workflow_id: u64,
}

impl Session {
    pub fn new(workflow_id: u64) -> Self {
        Self { workflow_id }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("store document {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable storage of job nodes and directed edges, keyed by [`JobId`].
///
/// Semantics shared by all implementations:
/// - `add_node` is an upsert. On an existing id it refreshes `file`, `type`
///   and payload but keeps the stored `state`.
/// - `add_edge` inserts missing endpoints as given; existing endpoints are
///   left untouched.
/// - Removing something absent is `Ok(false)`.
pub trait AdjacencyStore: Send {
    fn session(&self) -> Session;

    fn add_node(&mut self, job: &Job) -> StoreResult<bool>;
    fn add_edge(&mut self, from: &Job, to: &Job) -> StoreResult<bool>;

    /// Remove a node together with all of its incident edges.
    fn remove_node(&mut self, job: &Job) -> StoreResult<bool>;
    fn remove_edge(&mut self, from: &Job, to: &Job) -> StoreResult<bool>;

    fn contains(&self, job: &Job) -> StoreResult<bool>;
    fn has_edge(&self, from: &Job, to: &Job) -> StoreResult<bool>;

    /// Direct successors of `job`.
    fn neighbours_of(&self, job: &Job) -> StoreResult<Vec<Job>>;

    fn all_nodes(&self) -> StoreResult<Vec<Job>>;
    fn all_edges(&self) -> StoreResult<Vec<(Job, Job)>>;

    /// Persist `job.state` for the stored job with the same id.
    ///
    /// `Ok(false)` if the state was already stored or the id is unknown.
    fn update_state(&mut self, job: &Job) -> StoreResult<bool>;

    fn clear(&mut self) -> StoreResult<()>;

    /// Number of stored jobs in `state`.
    ///
    /// This is the cheap existence query used by the scheduler's
    /// termination check.
    fn count_in_state(&self, state: JobState) -> StoreResult<usize>;

    /// Look up a stored job by id.
    fn get(&self, id: JobId) -> StoreResult<Option<Job>>;

    fn max_id(&self) -> StoreResult<Option<JobId>> {
        Ok(self.all_nodes()?.iter().map(|j| j.id).max())
    }
}

/// Upsert `job` into `nodes`, preserving a stored state.
///
/// Shared by the concrete stores so their merge semantics cannot drift.
pub(crate) fn merge_node(existing: Option<&mut Job>, job: &Job) -> (bool, Option<Job>) {
    match existing {
        Some(stored) => {
            let changed = stored.file != job.file
                || stored.job_type != job.job_type
                || stored.payload != job.payload;
            if changed {
                stored.file = job.file.clone();
                stored.job_type = job.job_type;
                stored.payload = job.payload.clone();
            }
            (changed, None)
        }
        None => (true, Some(job.clone())),
    }
}

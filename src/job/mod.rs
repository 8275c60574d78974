// src/job/mod.rs

//! Job data model and lifecycle state machine.
//!
//! - [`Job`] is a single work item in the pipeline DAG.
//! - [`JobType`] is the ordered pipeline stage of a job.
//! - [`JobState`] is the lifecycle state; allowed moves are encoded in
//!   [`JobState::can_transition_to`].
//! - [`JobPayload`] carries the stage-specific inputs that end up in the
//!   job description file (see [`writer`]).

pub mod writer;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use writer::JobWriter;

/// Identity of a job within one workflow session.
pub type JobId = u64;

/// Pipeline stage of a job.
///
/// Stages are totally ordered by [`JobType::stage_index`]. `Undefined` is the
/// sentinel for type strings that could not be decoded; it sits outside the
/// order and is never schedulable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum JobType {
    Filter,
    Neighbours,
    Components,
    Contraction,
    Analysis,
    Merge,
    Undefined,
}

impl JobType {
    /// All schedulable stages in pipeline order.
    pub const STAGES: [JobType; 6] = [
        JobType::Filter,
        JobType::Neighbours,
        JobType::Components,
        JobType::Contraction,
        JobType::Analysis,
        JobType::Merge,
    ];

    /// Position in the pipeline, or `None` for `Undefined`.
    pub fn stage_index(self) -> Option<u8> {
        match self {
            JobType::Filter => Some(1),
            JobType::Neighbours => Some(2),
            JobType::Components => Some(3),
            JobType::Contraction => Some(4),
            JobType::Analysis => Some(5),
            JobType::Merge => Some(6),
            JobType::Undefined => None,
        }
    }

    /// Whether `self` is ordered strictly after `last`.
    ///
    /// Comparisons involving `Undefined` are always `false`.
    pub fn is_after(self, last: JobType) -> bool {
        match (self.stage_index(), last.stage_index()) {
            (Some(lhs), Some(rhs)) => lhs > rhs,
            _ => false,
        }
    }

    /// Whether `self` is ordered at or after `stage`.
    ///
    /// Used to decide whether a stage is enabled for a run whose last stage
    /// is `self`.
    pub fn includes(self, stage: JobType) -> bool {
        match (self.stage_index(), stage.stage_index()) {
            (Some(lhs), Some(rhs)) => lhs >= rhs,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Filter => "FILTER",
            JobType::Neighbours => "NEIGHBOURS",
            JobType::Components => "COMPONENTS",
            JobType::Contraction => "CONTRACTION",
            JobType::Analysis => "ANALYSIS",
            JobType::Merge => "MERGE",
            JobType::Undefined => "UNDEFINED",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parsing, used for configuration values.
impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "filter" => Ok(JobType::Filter),
            "neighbours" | "neighbors" => Ok(JobType::Neighbours),
            "components" => Ok(JobType::Components),
            "contraction" => Ok(JobType::Contraction),
            "analysis" => Ok(JobType::Analysis),
            "merge" => Ok(JobType::Merge),
            other => Err(format!(
                "unknown job type: {other} (expected one of filter, neighbours, components, contraction, analysis, merge)"
            )),
        }
    }
}

/// Lenient decoding, used when reading jobs back from a store.
impl From<String> for JobType {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(JobType::Undefined)
    }
}

impl From<JobType> for &'static str {
    fn from(t: JobType) -> Self {
        t.as_str()
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum JobState {
    Runnable,
    Running,
    Succeeded,
    Failed,
    Aborted,
    /// Sentinel for state strings that could not be decoded.
    Undefined,
}

impl JobState {
    /// Whether the scheduler's own transition table allows `self -> next`.
    ///
    /// ```text
    /// Runnable -> Running -> Succeeded
    ///                     -> Failed
    /// Runnable -> Aborted
    /// ```
    ///
    /// The resume reset (`Running`/`Failed` -> `Runnable`) is deliberately
    /// not part of this table; see [`Job::reset_for_resume`].
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Runnable, JobState::Running)
                | (JobState::Runnable, JobState::Aborted)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        )
    }

    /// No transition ever leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Aborted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Runnable => "RUNNABLE",
            JobState::Running => "RUNNING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
            JobState::Aborted => "ABORTED",
            JobState::Undefined => "UNDEFINED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "runnable" => JobState::Runnable,
            "running" => JobState::Running,
            "succeeded" | "succeed" => JobState::Succeeded,
            "failed" => JobState::Failed,
            "aborted" => JobState::Aborted,
            _ => JobState::Undefined,
        }
    }
}

impl From<JobState> for &'static str {
    fn from(s: JobState) -> Self {
        s.as_str()
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("job {job}: illegal state transition {from} -> {to}")]
pub struct TransitionError {
    pub job: JobId,
    pub from: JobState,
    pub to: JobState,
}

/// Stage-specific inputs of a job.
///
/// The scheduler never looks inside; the payload is written to the job
/// description file and carried through the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum JobPayload {
    Filter {
        input: PathBuf,
        config: PathBuf,
    },
    Neighbours {
        primary_input: PathBuf,
        additional_input: Vec<PathBuf>,
        config: PathBuf,
    },
    Components {
        config: PathBuf,
        job_directory: PathBuf,
        /// First id the components job may hand out to the jobs it creates.
        next_job_id: JobId,
    },
    Contraction {
        inputs: Vec<PathBuf>,
        components: Vec<u64>,
        config: PathBuf,
        output_stem: String,
    },
    Analysis {
        input: PathBuf,
        config: PathBuf,
        output_stem: String,
    },
    Merge {
        inputs: Vec<PathBuf>,
        output: PathBuf,
    },
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::Filter { .. } => JobType::Filter,
            JobPayload::Neighbours { .. } => JobType::Neighbours,
            JobPayload::Components { .. } => JobType::Components,
            JobPayload::Contraction { .. } => JobType::Contraction,
            JobPayload::Analysis { .. } => JobType::Analysis,
            JobPayload::Merge { .. } => JobType::Merge,
        }
    }
}

/// A unit of pipeline work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Path of the serialized job description consumed by the executor.
    pub file: PathBuf,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<JobPayload>,
}

impl Job {
    /// A fresh `Runnable` job without payload.
    pub fn new(id: JobId, file: impl Into<PathBuf>, job_type: JobType) -> Self {
        Self {
            id,
            file: file.into(),
            job_type,
            state: JobState::Runnable,
            payload: None,
        }
    }

    /// A fresh `Runnable` job whose type is taken from the payload.
    pub fn with_payload(id: JobId, file: impl Into<PathBuf>, payload: JobPayload) -> Self {
        Self {
            id,
            file: file.into(),
            job_type: payload.job_type(),
            state: JobState::Runnable,
            payload: Some(payload),
        }
    }

    /// Builder-style state override, mostly useful for seeding stores.
    pub fn in_state(mut self, state: JobState) -> Self {
        self.state = state;
        self
    }

    /// Apply a scheduler transition, enforcing the state machine.
    ///
    /// Returns `Ok(false)` when the job is already in `next`.
    pub fn transition(&mut self, next: JobState) -> Result<bool, TransitionError> {
        if self.state == next {
            return Ok(false);
        }
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                job: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(true)
    }

    /// The external resume reset: `Running`/`Failed` go back to `Runnable`.
    ///
    /// Returns whether the state changed.
    pub fn reset_for_resume(&mut self) -> bool {
        if matches!(self.state, JobState::Running | JobState::Failed) {
            self.state = JobState::Runnable;
            true
        } else {
            false
        }
    }

    pub fn file_name(&self) -> &str {
        self.file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

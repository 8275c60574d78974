// src/dag/report.rs

//! End-of-run summary returned by the scheduler.

use std::fmt;
use std::path::PathBuf;

use crate::job::{Job, JobId, JobType};

/// Identity of a job that ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedJob {
    pub id: JobId,
    pub file: PathBuf,
    pub job_type: JobType,
}

impl From<&Job> for FailedJob {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            file: job.file.clone(),
            job_type: job.job_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Scheduling passes performed.
    pub passes: u64,
    /// Jobs handed to the executor, in dispatch order.
    pub dispatched: Vec<JobId>,
    /// Jobs that reported `Failed`, in completion order.
    pub failed: Vec<FailedJob>,
    /// Jobs moved to `Aborted` during this run.
    pub aborted: Vec<JobId>,
    /// Jobs left `Runnable` or `Running` that could never make progress.
    pub stalled: Vec<JobId>,
}

impl RunReport {
    /// A run succeeds iff no job failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold a later run (e.g. the merge step) into this report.
    pub fn absorb(&mut self, other: RunReport) {
        self.passes += other.passes;
        self.dispatched.extend(other.dispatched);
        self.failed.extend(other.failed);
        self.aborted.extend(other.aborted);
        self.stalled = other.stalled;
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "dispatched {} job(s) in {} pass(es); {} failed, {} aborted, {} stalled",
            self.dispatched.len(),
            self.passes,
            self.failed.len(),
            self.aborted.len(),
            self.stalled.len()
        )?;
        for job in &self.failed {
            writeln!(f, "  FAILED: job {} [{}] {}", job.id, job.job_type, job.file.display())?;
        }
        if !self.stalled.is_empty() {
            writeln!(f, "  stalled: {:?}", self.stalled)?;
        }
        Ok(())
    }
}

// src/engine/recovery.rs

//! Store maintenance between runs: resume after a crash, status counts and
//! cleanup of finished workflows.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::Result;
use crate::fs::{files_with_extension, FileSystem};
use crate::job::{Job, JobState};
use crate::store::{AdjacencyStore, StoreResult};

/// Reset every `Running` or `Failed` job to `Runnable` and persist it.
///
/// Returns the jobs that were reset. Running it twice is a no-op the
/// second time. `Succeeded` and `Aborted` jobs are left alone, so a fresh
/// scheduler run never repeats finished work.
pub fn resume<S: AdjacencyStore>(store: &mut S) -> StoreResult<Vec<Job>> {
    let mut reset = Vec::new();
    for mut job in store.all_nodes()? {
        let previous = job.state;
        if job.reset_for_resume() {
            store.update_state(&job)?;
            info!(job = job.id, from = %previous, "reset job for resume");
            reset.push(job);
        }
    }
    info!(
        workflow = store.session().workflow_id,
        reset = reset.len(),
        "resume complete"
    );
    Ok(reset)
}

/// Number of stored jobs per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub runnable: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub aborted: usize,
    pub undefined: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.runnable + self.running + self.succeeded + self.failed + self.aborted + self.undefined
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "jobs: {}", self.total())?;
        writeln!(f, "  runnable:  {}", self.runnable)?;
        writeln!(f, "  running:   {}", self.running)?;
        writeln!(f, "  succeeded: {}", self.succeeded)?;
        writeln!(f, "  failed:    {}", self.failed)?;
        writeln!(f, "  aborted:   {}", self.aborted)?;
        if self.undefined > 0 {
            writeln!(f, "  undefined: {}", self.undefined)?;
        }
        Ok(())
    }
}

pub fn status<S: AdjacencyStore>(store: &S) -> StoreResult<StatusCounts> {
    Ok(StatusCounts {
        runnable: store.count_in_state(JobState::Runnable)?,
        running: store.count_in_state(JobState::Running)?,
        succeeded: store.count_in_state(JobState::Succeeded)?,
        failed: store.count_in_state(JobState::Failed)?,
        aborted: store.count_in_state(JobState::Aborted)?,
        undefined: store.count_in_state(JobState::Undefined)?,
    })
}

/// Remove every `*.json` job description in `job_directory` and clear the
/// store.
///
/// A missing job directory is not an error. Returns the removed files.
pub fn cleanup<S: AdjacencyStore>(
    store: &mut S,
    fs: &dyn FileSystem,
    job_directory: &Path,
) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if fs.is_dir(job_directory) {
        for file in files_with_extension(fs, job_directory, "json")? {
            fs.remove_file(&file)?;
            removed.push(file);
        }
    } else {
        warn!(dir = %job_directory.display(), "job directory does not exist; nothing to remove");
    }
    store.clear()?;
    info!(
        workflow = store.session().workflow_id,
        removed = removed.len(),
        "cleanup complete"
    );
    Ok(removed)
}

// src/dag/listener.rs

//! Built-in state-change listeners.
//!
//! Register with [`Scheduler::add_listener`](crate::dag::Scheduler::add_listener).

use tracing::info;

use crate::dag::JobDag;
use crate::job::{Job, JobState};
use crate::store::AdjacencyStore;

/// One structured log line per persisted transition.
pub fn log_transition<S: AdjacencyStore>(dag: &JobDag<S>, job: &Job) {
    info!(
        workflow = dag.store().session().workflow_id,
        job = job.id,
        job_type = %job.job_type,
        state = %job.state,
        file = job.file_name(),
        "job state changed"
    );
}

/// Periodic progress line, emitted whenever a job reaches a terminal state.
pub fn log_progress<S: AdjacencyStore>(dag: &JobDag<S>, job: &Job) {
    if !job.state.is_terminal() {
        return;
    }
    let store = dag.store();
    let count = |state| store.count_in_state(state).unwrap_or_default();
    let done = count(JobState::Succeeded) + count(JobState::Failed) + count(JobState::Aborted);
    let total = done + count(JobState::Runnable) + count(JobState::Running);
    info!(
        workflow = store.session().workflow_id,
        done,
        total,
        failed = count(JobState::Failed),
        "progress"
    );
}

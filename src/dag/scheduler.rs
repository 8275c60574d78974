// src/dag/scheduler.rs

//! Dependency-aware scheduling loop.
//!
//! A [`Scheduler`] repeatedly snapshots the job DAG, dispatches every
//! eligible job to its [`Executor`] (bounded by `concurrency`), applies
//! stage pruning and cascading aborts, and waits for completions. A run
//! finishes when the store has no `Runnable` or `Running` job left, or
//! when a pass makes no progress with nothing in flight (stall).
//!
//! Completions arrive on the executor's own task through a callback. The
//! callback persists the terminal state, notifies listeners and wakes the
//! loop, so the next pass starts without waiting for the poll interval.
//! All shared state sits behind one `std::sync::Mutex`, which is never
//! held across an `.await` or while calling into the executor.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::dag::eligibility::{decide, AbortReason, Decision, EligibilityRules};
use crate::dag::report::{FailedJob, RunReport};
use crate::dag::JobDag;
use crate::exec::Executor;
use crate::job::{Job, JobId, JobState, JobType};
use crate::store::{AdjacencyStore, StoreError, StoreResult};
use crate::types::FailurePolicy;

/// Observer invoked after every persisted state change.
///
/// Listeners run while the scheduler lock is held: they must not call back
/// into the scheduler.
pub type StateListener<S> = Box<dyn Fn(&JobDag<S>, &Job) + Send>;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Last stage of this run; later `Runnable` jobs are aborted.
    pub last_job_type: JobType,
    /// Maximum number of jobs in flight.
    pub concurrency: usize,
    /// Upper bound on the wait between two passes.
    pub poll_interval: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            last_job_type: JobType::Merge,
            concurrency: 4,
            poll_interval: Duration::from_millis(500),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl SchedulerOptions {
    fn rules(&self) -> EligibilityRules {
        EligibilityRules {
            last_job_type: self.last_job_type,
            concurrency: self.concurrency,
            failure_policy: self.failure_policy,
        }
    }
}

struct Shared<S> {
    dag: JobDag<S>,
    in_flight: usize,
    /// Dispatched jobs whose completion has not been seen yet.
    outstanding: HashSet<JobId>,
    /// Failures reported since the loop last looked.
    failed: Vec<FailedJob>,
    /// First store error raised inside a completion callback.
    fatal: Option<StoreError>,
    listeners: Vec<StateListener<S>>,
}

impl<S: AdjacencyStore> Shared<S> {
    fn notify(&self, job: &Job) {
        for listener in &self.listeners {
            listener(&self.dag, job);
        }
    }

    fn pending(&self) -> StoreResult<usize> {
        let store = self.dag.store();
        Ok(store.count_in_state(JobState::Runnable)? + store.count_in_state(JobState::Running)?)
    }

    /// One scheduling pass over a fresh snapshot.
    fn pass(&mut self, rules: &EligibilityRules, report: &mut RunReport) -> StoreResult<Pass> {
        let mut view = self.dag.view()?;
        let mut pass = Pass::default();

        for id in view.ids() {
            let Some(job) = view.job(id) else { continue };
            let next = match decide(job, &view, rules, self.in_flight) {
                Decision::Wait => continue,
                Decision::Dispatch => JobState::Running,
                Decision::Abort(reason) => {
                    match reason {
                        AbortReason::PastLastStage => debug!(
                            job = id,
                            job_type = %job.job_type,
                            last = %rules.last_job_type,
                            "aborting job past the last stage"
                        ),
                        AbortReason::UpstreamFailed { ancestor } => info!(
                            job = id,
                            ancestor,
                            "aborting job with a failed ancestor"
                        ),
                    }
                    JobState::Aborted
                }
            };

            let mut job = job.clone();
            if let Err(err) = job.transition(next) {
                warn!(error = %err, "skipping invalid transition");
                continue;
            }
            self.dag.update_state(&job)?;
            if let Some(seen) = view.job_mut(id) {
                seen.state = next;
            }
            self.notify(&job);

            if next == JobState::Running {
                self.outstanding.insert(id);
                self.in_flight += 1;
                report.dispatched.push(id);
                pass.dispatch.push(job);
            } else {
                report.aborted.push(id);
                pass.transitions += 1;
            }
        }

        pass.in_flight = self.in_flight;
        Ok(pass)
    }

    fn remaining(&self) -> StoreResult<Vec<JobId>> {
        Ok(self
            .dag
            .nodes()?
            .into_iter()
            .filter(|j| matches!(j.state, JobState::Runnable | JobState::Running))
            .map(|j| j.id)
            .collect())
    }
}

#[derive(Default)]
struct Pass {
    dispatch: Vec<Job>,
    transitions: usize,
    in_flight: usize,
}

impl Pass {
    fn made_progress(&self) -> bool {
        !self.dispatch.is_empty() || self.transitions > 0
    }
}

pub struct Scheduler<S, E> {
    shared: Arc<Mutex<Shared<S>>>,
    executor: E,
    options: SchedulerOptions,
    wakeup: Arc<Notify>,
}

impl<S, E> Scheduler<S, E>
where
    S: AdjacencyStore + 'static,
    E: Executor,
{
    /// Build a scheduler over `dag` and register the completion callback
    /// with `executor`.
    pub fn new(dag: JobDag<S>, mut executor: E, options: SchedulerOptions) -> Self {
        let shared = Arc::new(Mutex::new(Shared {
            dag,
            in_flight: 0,
            outstanding: HashSet::new(),
            failed: Vec::new(),
            fatal: None,
            listeners: Vec::new(),
        }));
        let wakeup = Arc::new(Notify::new());

        let cb_shared = Arc::clone(&shared);
        let cb_wakeup = Arc::clone(&wakeup);
        executor.set_callback(Arc::new(move |job: Job| {
            on_complete(&cb_shared, job);
            cb_wakeup.notify_one();
        }));

        Self {
            shared,
            executor,
            options,
            wakeup,
        }
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&JobDag<S>, &Job) + Send + 'static,
    {
        lock(&self.shared).listeners.push(Box::new(listener));
    }

    /// Run `f` with exclusive access to the DAG.
    pub fn with_dag<R>(&self, f: impl FnOnce(&mut JobDag<S>) -> R) -> R {
        f(&mut lock(&self.shared).dag)
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.shared).in_flight
    }

    /// Drive the DAG until no `Runnable`/`Running` job remains or no
    /// further progress is possible.
    ///
    /// May be called again after new jobs were added (e.g. a merge step).
    /// The returned report only covers this call.
    pub async fn run(&self) -> StoreResult<RunReport> {
        let rules = self.options.rules();
        let mut report = RunReport::default();
        info!(
            last = %rules.last_job_type,
            concurrency = rules.concurrency,
            policy = ?rules.failure_policy,
            "scheduler run started"
        );

        loop {
            let pass = {
                let mut shared = lock(&self.shared);
                if let Some(err) = shared.fatal.take() {
                    error!(error = %err, "store failure during completion; stopping run");
                    return Err(err);
                }
                report.failed.append(&mut shared.failed);
                if shared.pending()? == 0 {
                    break;
                }
                shared.pass(&rules, &mut report)?
            };
            report.passes += 1;

            if !pass.made_progress() && pass.in_flight == 0 {
                report.stalled = lock(&self.shared).remaining()?;
                warn!(stalled = ?report.stalled, "no job can make progress; stopping run");
                break;
            }

            let dispatched = !pass.dispatch.is_empty();
            for job in pass.dispatch {
                debug!(job = job.id, file = %job.file.display(), "dispatching job");
                self.executor.dispatch(job);
            }

            if pass.transitions > 0 && !dispatched {
                // Aborts may have unblocked nothing else; re-check at once.
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.poll_interval) => {}
                _ = self.wakeup.notified() => {}
            }
        }

        info!(
            passes = report.passes,
            dispatched = report.dispatched.len(),
            failed = report.failed.len(),
            aborted = report.aborted.len(),
            stalled = report.stalled.len(),
            "scheduler run finished"
        );
        Ok(report)
    }
}

fn lock<S>(shared: &Mutex<Shared<S>>) -> MutexGuard<'_, Shared<S>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn on_complete<S: AdjacencyStore>(shared: &Mutex<Shared<S>>, mut job: Job) {
    let mut shared = lock(shared);
    if !shared.outstanding.remove(&job.id) {
        warn!(job = job.id, "completion for a job that is not in flight; ignoring");
        return;
    }
    shared.in_flight = shared.in_flight.saturating_sub(1);

    if !matches!(job.state, JobState::Succeeded | JobState::Failed) {
        warn!(job = job.id, state = %job.state, "executor reported a non-terminal state; treating as failed");
        job.state = JobState::Failed;
    }

    if let Err(err) = shared.dag.update_state(&job) {
        error!(job = job.id, error = %err, "failed to persist job completion");
        if shared.fatal.is_none() {
            shared.fatal = Some(err);
        }
        return;
    }
    shared.notify(&job);

    if job.state == JobState::Failed {
        shared.failed.push(FailedJob::from(&job));
    }
}

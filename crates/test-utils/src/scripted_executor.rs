use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sdaflow::exec::{CompletionCallback, Executor};
use sdaflow::job::{Job, JobId, JobState};

/// What a [`ScriptedExecutor`] observed, shared with the test body.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    /// Job ids in dispatch order.
    pub dispatched: Vec<JobId>,
    /// Job ids in completion order.
    pub completed: Vec<JobId>,
    /// Jobs currently between dispatch and callback.
    pub running: usize,
    /// Highest value `running` ever reached.
    pub max_running: usize,
}

impl ExecutionLog {
    /// Number of times `id` was dispatched.
    pub fn dispatch_count(&self, id: JobId) -> usize {
        self.dispatched.iter().filter(|d| **d == id).count()
    }
}

/// An executor that doesn't spawn processes:
/// - each job "runs" on its own tokio task for an optional delay;
/// - the outcome is `Succeeded` unless scripted otherwise per job id;
/// - every dispatch and completion is recorded in an [`ExecutionLog`].
#[derive(Default)]
pub struct ScriptedExecutor {
    callback: Option<CompletionCallback>,
    outcomes: HashMap<JobId, JobState>,
    delays: HashMap<JobId, Duration>,
    default_delay: Duration,
    log: Arc<Mutex<ExecutionLog>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make job `id` report `Failed`.
    pub fn failing(mut self, id: JobId) -> Self {
        self.outcomes.insert(id, JobState::Failed);
        self
    }

    /// Report `state` for job `id` (may be a non-terminal state, to test
    /// how the scheduler copes with misbehaving executors).
    pub fn with_outcome(mut self, id: JobId, state: JobState) -> Self {
        self.outcomes.insert(id, state);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_job_delay(mut self, id: JobId, delay: Duration) -> Self {
        self.delays.insert(id, delay);
        self
    }

    /// Shared handle to the log; keep it before moving the executor into a
    /// scheduler.
    pub fn log(&self) -> Arc<Mutex<ExecutionLog>> {
        Arc::clone(&self.log)
    }
}

impl Executor for ScriptedExecutor {
    fn set_callback(&mut self, callback: CompletionCallback) {
        self.callback = Some(callback);
    }

    fn dispatch(&self, mut job: Job) {
        let callback = self
            .callback
            .clone()
            .expect("set_callback must be called before dispatch");
        let outcome = self
            .outcomes
            .get(&job.id)
            .copied()
            .unwrap_or(JobState::Succeeded);
        let delay = self
            .delays
            .get(&job.id)
            .copied()
            .unwrap_or(self.default_delay);

        {
            let mut log = self.log.lock().unwrap();
            log.dispatched.push(job.id);
            log.running += 1;
            log.max_running = log.max_running.max(log.running);
        }

        let log = Arc::clone(&self.log);
        tokio::spawn(async move {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
            {
                let mut log = log.lock().unwrap();
                log.running -= 1;
                log.completed.push(job.id);
            }
            job.state = outcome;
            callback(job);
        });
    }
}

// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The scheduler hands jobs to an [`Executor`] and learns about their
//! outcome through a [`CompletionCallback`] it registers up front.
//!
//! Contract every implementation must keep:
//! - `dispatch` returns without waiting for the job to finish;
//! - the callback fires **exactly once** per dispatched job;
//! - the job passed to the callback has state `Succeeded` or `Failed`.
//!
//! Production code uses [`super::CommandExecutor`]; tests provide their own
//! implementation that doesn't spawn real processes.

use std::sync::Arc;

use crate::job::Job;

/// Completion notification, invoked from the executor's own task/thread.
pub type CompletionCallback = Arc<dyn Fn(Job) + Send + Sync>;

pub trait Executor: Send + Sync {
    /// Register the completion callback. Called once, before any dispatch.
    fn set_callback(&mut self, callback: CompletionCallback);

    /// Start running `job` asynchronously.
    fn dispatch(&self, job: Job);
}

// src/dag/eligibility.rs

//! Per-job scheduling decision for a single pass.

use crate::dag::DagView;
use crate::job::{Job, JobId, JobState, JobType};
use crate::types::FailurePolicy;

/// Run-wide inputs to the eligibility predicate.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityRules {
    pub last_job_type: JobType,
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
}

/// Why a `Runnable` job is moved to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The job's stage is after the run's last stage.
    PastLastStage,
    /// An ancestor ended in a state that blocks descendants under the
    /// active failure policy.
    UpstreamFailed { ancestor: JobId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Move to `Running` and hand to the executor.
    Dispatch,
    /// Move to `Aborted`.
    Abort(AbortReason),
    /// Not schedulable in this pass.
    Wait,
}

/// Decide what to do with `job` given the current snapshot.
///
/// Checks, in order:
/// 1. stage pruning (`Runnable` jobs past the last stage are aborted),
/// 2. the job must be `Runnable`,
/// 3. cascading failure (only under [`FailurePolicy::Cascade`]),
/// 4. the concurrency bound,
/// 5. every transitive ancestor is finished.
pub fn decide(job: &Job, view: &DagView, rules: &EligibilityRules, in_flight: usize) -> Decision {
    if job.state != JobState::Runnable {
        return Decision::Wait;
    }
    if job.job_type.is_after(rules.last_job_type) {
        return Decision::Abort(AbortReason::PastLastStage);
    }
    if job.job_type == JobType::Undefined {
        return Decision::Wait;
    }

    if view.in_degree(job.id) == 0 {
        return if in_flight < rules.concurrency {
            Decision::Dispatch
        } else {
            Decision::Wait
        };
    }

    let ancestors = view.ancestors_of(job.id);

    if let Some(blocker) = ancestors
        .iter()
        .find(|a| rules.failure_policy.blocks_descendants(a.state))
    {
        return Decision::Abort(AbortReason::UpstreamFailed {
            ancestor: blocker.id,
        });
    }

    if in_flight >= rules.concurrency {
        return Decision::Wait;
    }

    if ancestors
        .iter()
        .all(|a| rules.failure_policy.is_finished(a.state))
    {
        Decision::Dispatch
    } else {
        Decision::Wait
    }
}

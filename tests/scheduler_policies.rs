// tests/scheduler_policies.rs

use std::error::Error;

use sdaflow::dag::{Scheduler, SchedulerOptions};
use sdaflow::job::{JobState, JobType};
use sdaflow::types::FailurePolicy;
use sdaflow_test_utils::builders::{states, DagBuilder};
use sdaflow_test_utils::{init_tracing, with_timeout, ScriptedExecutor};
use tokio::time::Duration;

type TestResult = Result<(), Box<dyn Error>>;

fn options(policy: FailurePolicy, concurrency: usize) -> SchedulerOptions {
    SchedulerOptions {
        last_job_type: JobType::Components,
        concurrency,
        poll_interval: Duration::from_millis(20),
        failure_policy: policy,
    }
}

/// 0 -> 1 -> 2 plus an unrelated filter job 3.
fn chain_with_bystander() -> DagBuilder {
    DagBuilder::new()
        .job(0, JobType::Filter)
        .job(1, JobType::Neighbours)
        .job(2, JobType::Components)
        .job(3, JobType::Filter)
        .edge(0, 1)
        .edge(1, 2)
}

#[tokio::test]
async fn cascade_aborts_every_descendant_of_a_failure() -> TestResult {
    init_tracing();

    let executor = ScriptedExecutor::new().failing(0);
    let log = executor.log();
    let scheduler = Scheduler::new(
        chain_with_bystander().build(),
        executor,
        options(FailurePolicy::Cascade, 4),
    );

    let report = with_timeout(scheduler.run()).await?;

    assert!(!report.is_success());
    assert_eq!(report.failed.iter().map(|f| f.id).collect::<Vec<_>>(), vec![0]);
    let mut aborted = report.aborted.clone();
    aborted.sort();
    assert_eq!(aborted, vec![1, 2]);
    assert!(report.stalled.is_empty());

    let log = log.lock().unwrap();
    assert_eq!(log.dispatch_count(1), 0);
    assert_eq!(log.dispatch_count(2), 0);
    assert_eq!(log.dispatch_count(3), 1);
    scheduler.with_dag(|dag| {
        assert_eq!(
            states(dag),
            vec![
                (0, JobState::Failed),
                (1, JobState::Aborted),
                (2, JobState::Aborted),
                (3, JobState::Succeeded),
            ]
        );
    });
    Ok(())
}

#[tokio::test]
async fn permissive_policy_runs_descendants_of_a_failure() -> TestResult {
    let executor = ScriptedExecutor::new().failing(0);
    let scheduler = Scheduler::new(
        chain_with_bystander().build(),
        executor,
        options(FailurePolicy::Permissive, 4),
    );

    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.failed.len(), 1);
    assert!(report.aborted.is_empty());
    scheduler.with_dag(|dag| {
        assert_eq!(
            states(dag),
            vec![
                (0, JobState::Failed),
                (1, JobState::Succeeded),
                (2, JobState::Succeeded),
                (3, JobState::Succeeded),
            ]
        );
    });
    Ok(())
}

#[tokio::test]
async fn in_flight_jobs_never_exceed_concurrency() -> TestResult {
    init_tracing();

    let mut builder = DagBuilder::new();
    for id in 0..12 {
        builder = builder.job(id, JobType::Filter);
    }
    let executor = ScriptedExecutor::new().with_delay(Duration::from_millis(15));
    let log = executor.log();
    let scheduler = Scheduler::new(builder.build(), executor, options(FailurePolicy::Permissive, 3));

    let report = with_timeout(scheduler.run()).await?;

    assert!(report.is_success());
    assert_eq!(report.dispatched.len(), 12);
    let log = log.lock().unwrap();
    assert!(log.max_running <= 3, "max_running = {}", log.max_running);
    assert!(log.max_running >= 1);
    for id in 0..12 {
        assert_eq!(log.dispatch_count(id), 1, "job {id} dispatched more than once");
    }
    assert_eq!(scheduler.in_flight(), 0);
    Ok(())
}

#[tokio::test]
async fn jobs_after_the_last_stage_are_aborted_not_run() -> TestResult {
    let dag = DagBuilder::new()
        .job(0, JobType::Filter)
        .job(1, JobType::Contraction)
        .job(2, JobType::Analysis)
        .job(3, JobType::Merge)
        .job_in(4, JobType::Merge, JobState::Succeeded)
        .edge(0, 1)
        .build();
    let executor = ScriptedExecutor::new();
    let log = executor.log();
    let scheduler = Scheduler::new(dag, executor, options(FailurePolicy::Permissive, 4));

    let report = with_timeout(scheduler.run()).await?;

    let mut aborted = report.aborted.clone();
    aborted.sort();
    assert_eq!(aborted, vec![1, 2, 3]);
    assert_eq!(log.lock().unwrap().dispatched, vec![0]);
    scheduler.with_dag(|dag| {
        let states = states(dag);
        assert_eq!(states[4], (4, JobState::Succeeded));
    });
    Ok(())
}

#[tokio::test]
async fn non_terminal_completion_is_recorded_as_failure() -> TestResult {
    let dag = DagBuilder::new().job(0, JobType::Filter).build();
    let executor = ScriptedExecutor::new().with_outcome(0, JobState::Running);
    let scheduler = Scheduler::new(dag, executor, options(FailurePolicy::Permissive, 1));

    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.failed.len(), 1);
    scheduler.with_dag(|dag| assert_eq!(states(dag), vec![(0, JobState::Failed)]));
    Ok(())
}

#[tokio::test]
async fn orphaned_running_job_is_reported_as_stalled() -> TestResult {
    let dag = DagBuilder::new()
        .job_in(0, JobType::Filter, JobState::Running)
        .job(1, JobType::Neighbours)
        .edge(0, 1)
        .build();
    let executor = ScriptedExecutor::new();
    let log = executor.log();
    let scheduler = Scheduler::new(dag, executor, options(FailurePolicy::Permissive, 2));

    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.stalled, vec![0, 1]);
    assert!(log.lock().unwrap().dispatched.is_empty());
    Ok(())
}

#[tokio::test]
async fn undefined_ancestor_blocks_descendants_without_spinning() -> TestResult {
    let dag = DagBuilder::new()
        .job(0, JobType::Undefined)
        .job(1, JobType::Neighbours)
        .job(2, JobType::Filter)
        .edge(0, 1)
        .build();
    let scheduler = Scheduler::new(dag, ScriptedExecutor::new(), options(FailurePolicy::Permissive, 2));

    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.dispatched, vec![2]);
    assert_eq!(report.stalled, vec![0, 1]);
    Ok(())
}

#[tokio::test]
async fn second_run_picks_up_jobs_added_afterwards() -> TestResult {
    let dag = DagBuilder::new().job(0, JobType::Filter).build();
    let scheduler = Scheduler::new(dag, ScriptedExecutor::new(), options(FailurePolicy::Permissive, 2));

    let first = with_timeout(scheduler.run()).await?;
    assert_eq!(first.dispatched, vec![0]);

    scheduler.with_dag(|dag| {
        let job = sdaflow::job::Job::new(1, "1.json", JobType::Components);
        dag.add_node(&job).unwrap();
    });
    let second = with_timeout(scheduler.run()).await?;

    assert_eq!(second.dispatched, vec![1]);
    scheduler.with_dag(|dag| {
        assert_eq!(states(dag), vec![(0, JobState::Succeeded), (1, JobState::Succeeded)]);
    });
    Ok(())
}

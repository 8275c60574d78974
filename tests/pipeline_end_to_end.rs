// tests/pipeline_end_to_end.rs

use std::error::Error;
use std::fs;
use std::path::Path;

use sdaflow::dag::JobDag;
use sdaflow::engine::{recovery, Pipeline};
use sdaflow::errors::SdaflowError;
use sdaflow::fs::mock::MockFileSystem;
use sdaflow::fs::{FileSystem, RealFileSystem};
use sdaflow::job::{Job, JobState, JobType};
use sdaflow::store::{AdjacencyStore, JsonFileStore};
use sdaflow_test_utils::builders::{states, DagBuilder};
use sdaflow_test_utils::{init_tracing, with_timeout, ConfigFileBuilder, ScriptedExecutor};
use serde_json::Value;

type TestResult = Result<(), Box<dyn Error>>;

/// Two neighbouring tiles, a stage config, and pre-existing analysis
/// outputs in the working directory.
fn seed_workspace(root: &Path) -> std::io::Result<()> {
    fs::create_dir_all(root.join("in"))?;
    fs::create_dir_all(root.join("work"))?;
    fs::write(root.join("in/area_0_0.shp"), b"")?;
    fs::write(root.join("in/area_0_1.shp"), b"")?;
    fs::write(root.join("in/readme.txt"), b"not an input")?;
    fs::write(root.join("sda.json"), b"{\"threshold\": 5}")?;
    fs::write(root.join("work/analysis_0.shp"), b"")?;
    fs::write(root.join("work/analysis_1.shp"), b"")?;
    fs::write(root.join("work/analysis_0_edges.shp"), b"")?;
    fs::write(root.join("work/unrelated.shp"), b"")?;
    Ok(())
}

#[tokio::test]
async fn full_run_generates_schedules_and_merges() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    seed_workspace(root)?;

    let cfg = ConfigFileBuilder::new(root).last_job_type("merge").build();
    let fs = RealFileSystem;
    let pipeline = Pipeline::new(&cfg, &fs);
    let store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;

    let executor = ScriptedExecutor::new();
    let log = executor.log();
    let report = with_timeout(pipeline.run(JobDag::new(store), executor)).await?;

    assert!(report.is_success(), "{report}");
    // 2 filter + 2 neighbours + 1 components + merge + merge edges
    assert_eq!(report.dispatched.len(), 7);
    assert_eq!(log.lock().unwrap().dispatched.len(), 7);

    for name in [
        "Filter_area_0_0.json",
        "Filter_area_0_1.json",
        "Neighbour_area_0_0.json",
        "Neighbour_area_0_1.json",
        "ComponentsJob.json",
        "Merge.json",
        "Merge_edges.json",
    ] {
        assert!(root.join("jobs").join(name).is_file(), "missing {name}");
    }

    let merge: Value = serde_json::from_str(&fs::read_to_string(root.join("jobs/Merge.json"))?)?;
    let inputs: Vec<&str> = merge["shpFiles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert_eq!(inputs.len(), 2);
    assert!(inputs.iter().all(|p| !p.ends_with("_edges.shp")));
    assert!(inputs.iter().all(|p| !p.contains("unrelated")));
    assert!(merge["outputPath"].as_str().unwrap().ends_with("result.shp"));

    let edges: Value = serde_json::from_str(&fs::read_to_string(root.join("jobs/Merge_edges.json"))?)?;
    assert!(edges["outputPath"].as_str().unwrap().ends_with("result_edges.shp"));

    assert_eq!(
        fs::read_to_string(root.join("out/result_cfg.json"))?,
        "{\"threshold\": 5}"
    );

    // Everything was persisted: a fresh handle sees only finished jobs.
    let reopened = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
    assert_eq!(reopened.count_in_state(JobState::Succeeded)?, 7);
    Ok(())
}

#[tokio::test]
async fn cleanup_after_success_removes_descriptions_and_store_content() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    seed_workspace(root)?;

    let cfg = ConfigFileBuilder::new(root)
        .last_job_type("components")
        .cleanup_after(true)
        .build();
    let fs = RealFileSystem;
    let pipeline = Pipeline::new(&cfg, &fs);
    let store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;

    let report = with_timeout(pipeline.run(JobDag::new(store), ScriptedExecutor::new())).await?;

    assert!(report.is_success());
    let leftover: Vec<_> = fs::read_dir(root.join("jobs"))?.collect::<Result<_, _>>()?;
    assert!(leftover.is_empty(), "job directory not cleaned: {leftover:?}");
    let reopened = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
    assert!(reopened.all_nodes()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn failures_keep_everything_for_inspection() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    seed_workspace(root)?;

    let cfg = ConfigFileBuilder::new(root)
        .last_job_type("components")
        .cleanup_after(true)
        .build();
    let fs = RealFileSystem;
    let pipeline = Pipeline::new(&cfg, &fs);
    let store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;

    let report =
        with_timeout(pipeline.run(JobDag::new(store), ScriptedExecutor::new().failing(1))).await?;

    assert!(!report.is_success());
    assert!(root.join("jobs/Filter_area_0_1.json").is_file());
    let reopened = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
    assert_eq!(reopened.count_in_state(JobState::Failed)?, 1);
    Ok(())
}

#[tokio::test]
async fn no_matching_inputs_is_a_configuration_error() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    fs::create_dir_all(root.join("in"))?;
    fs::write(root.join("in/readme.txt"), b"")?;

    let cfg = ConfigFileBuilder::new(root).build();
    let fs = RealFileSystem;
    let pipeline = Pipeline::new(&cfg, &fs);
    let store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;

    let err = pipeline
        .run(JobDag::new(store), ScriptedExecutor::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SdaflowError::ConfigError(_)), "{err}");
    assert!(!root.join("jobs").exists());
    Ok(())
}

#[tokio::test]
async fn resume_after_crash_never_reruns_succeeded_jobs() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    let cfg = ConfigFileBuilder::new(root).workflow_id(9).build();

    {
        // Simulated crash: one job finished, one was running, one failed.
        let mut store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
        let done = Job::new(0, "0.json", JobType::Filter).in_state(JobState::Succeeded);
        let running = Job::new(1, "1.json", JobType::Filter).in_state(JobState::Running);
        let failed = Job::new(2, "2.json", JobType::Filter).in_state(JobState::Failed);
        let next = Job::new(3, "3.json", JobType::Neighbours);
        store.add_edge(&done, &next)?;
        store.add_edge(&running, &next)?;
        store.add_edge(&failed, &next)?;
    }

    let mut store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
    let reset = recovery::resume(&mut store)?;
    assert_eq!(reset.iter().map(|j| j.id).collect::<Vec<_>>(), vec![1, 2]);

    let fs = RealFileSystem;
    let pipeline = Pipeline::new(&cfg, &fs);
    let executor = ScriptedExecutor::new();
    let log = executor.log();
    let report = with_timeout(pipeline.schedule(JobDag::new(store), executor)).await?;

    assert!(report.is_success());
    let log = log.lock().unwrap();
    assert_eq!(log.dispatch_count(0), 0);
    assert_eq!(log.dispatch_count(3), 1);
    drop(log);

    let reopened = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
    let dag = JobDag::new(reopened);
    assert_eq!(
        states(&dag),
        vec![
            (0, JobState::Succeeded),
            (1, JobState::Succeeded),
            (2, JobState::Succeeded),
            (3, JobState::Succeeded),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn cleanup_before_starts_from_an_empty_store() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    seed_workspace(root)?;
    fs::create_dir_all(root.join("jobs"))?;
    fs::write(root.join("jobs/Stale.json"), b"{}")?;

    let cfg = ConfigFileBuilder::new(root)
        .last_job_type("filter")
        .cleanup_before(true)
        .build();
    {
        let mut store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
        store.add_node(&Job::new(40, "stale.json", JobType::Merge))?;
    }

    let fs = RealFileSystem;
    let pipeline = Pipeline::new(&cfg, &fs);
    let store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
    let report = with_timeout(pipeline.run(JobDag::new(store), ScriptedExecutor::new())).await?;

    assert_eq!(report.dispatched, vec![0, 1]);
    assert!(!root.join("jobs/Stale.json").exists());
    Ok(())
}

#[tokio::test]
async fn second_run_on_a_populated_store_is_refused() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    seed_workspace(root)?;

    let cfg = ConfigFileBuilder::new(root).last_job_type("components").build();
    let fs = RealFileSystem;
    let pipeline = Pipeline::new(&cfg, &fs);

    let store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
    let first = with_timeout(pipeline.run(JobDag::new(store), ScriptedExecutor::new())).await?;
    assert!(first.is_success());

    let store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
    let executor = ScriptedExecutor::new();
    let log = executor.log();
    let err = pipeline.run(JobDag::new(store), executor).await.unwrap_err();

    assert!(matches!(err, SdaflowError::ConfigError(ref msg) if msg.contains("resume")), "{err}");
    assert!(log.lock().unwrap().dispatched.is_empty());
    let reopened = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
    // 2 filter + 2 neighbours + 1 components, nothing duplicated
    assert_eq!(reopened.all_nodes()?.len(), 5);
    Ok(())
}

#[test]
fn merge_jobs_wait_for_every_analysis_job() -> TestResult {
    let cfg = ConfigFileBuilder::new("/sda").last_job_type("merge").build();
    let fs = MockFileSystem::new();
    fs.add_file("/sda/work/analysis_0.shp", Vec::new());
    fs.add_file("/sda/work/analysis_0_edges.shp", Vec::new());
    let pipeline = Pipeline::new(&cfg, &fs);

    let mut dag = DagBuilder::new()
        .job_in(0, JobType::Components, JobState::Succeeded)
        .job(1, JobType::Analysis)
        .job(2, JobType::Analysis)
        .build();

    let merge = pipeline.add_merge_jobs(&mut dag)?;

    assert_eq!(merge.iter().map(|j| j.id).collect::<Vec<_>>(), vec![3, 4]);
    for job in &merge {
        assert_eq!(dag.in_degree(job)?, 2);
    }
    assert!(fs.is_file(Path::new("/sda/jobs/Merge.json")));
    assert_eq!(states(&dag)[1], (1, JobState::Runnable));

    // Already present: nothing new.
    assert!(pipeline.add_merge_jobs(&mut dag)?.is_empty());
    Ok(())
}

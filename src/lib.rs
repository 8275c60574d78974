// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod generator;
pub mod job;
pub mod logging;
pub mod store;
pub mod types;

use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{JobDag, RunReport};
use crate::engine::{recovery, Pipeline};
use crate::exec::CommandExecutor;
use crate::fs::mock::MockFileSystem;
use crate::fs::RealFileSystem;
use crate::store::{JsonFileStore, MemoryStore};

/// High-level entry point used by `main.rs`.
///
/// Loads the config, opens the persistent store for the configured
/// workflow session and dispatches to the requested command.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let fs = RealFileSystem;
    let pipeline = Pipeline::new(&cfg, &fs);

    if let Command::Run { dry_run: true } = args.command {
        return print_dry_run(&pipeline);
    }

    let store = JsonFileStore::open(cfg.store_directory(), cfg.session())?;
    info!(
        workflow = cfg.workflow.id,
        store = %store.path().display(),
        last = %cfg.last_job_type,
        "starting command"
    );
    let mut dag = JobDag::new(store);

    match args.command {
        Command::Run { .. } => {
            let report = pipeline.run(dag, executor(&cfg)).await?;
            finish(report)
        }
        Command::Generate => {
            let jobs = pipeline.generate(&mut dag)?;
            println!("generated {} job(s) with {} edge(s)", jobs.len(), jobs.edges);
            Ok(())
        }
        Command::Schedule => {
            let report = pipeline.schedule(dag, executor(&cfg)).await?;
            finish(report)
        }
        Command::Resume { no_schedule } => {
            let reset = recovery::resume(dag.store_mut())?;
            println!("reset {} job(s) to RUNNABLE", reset.len());
            if no_schedule {
                return Ok(());
            }
            let report = pipeline.schedule(dag, executor(&cfg)).await?;
            finish(report)
        }
        Command::Status => {
            print!("{}", recovery::status(dag.store())?);
            Ok(())
        }
        Command::Cleanup => {
            let removed = recovery::cleanup(dag.store_mut(), &fs, &cfg.workflow.job_directory)?;
            println!("removed {} job description(s); store cleared", removed.len());
            Ok(())
        }
    }
}

fn executor(cfg: &ConfigFile) -> CommandExecutor {
    CommandExecutor::new(cfg.command_spec())
}

fn finish(report: RunReport) -> Result<()> {
    print!("{report}");
    if report.is_success() {
        Ok(())
    } else {
        bail!("{} job(s) failed", report.failed.len())
    }
}

/// Generate into an in-memory store and filesystem and print the
/// resulting DAG in dependency order. Only input discovery touches disk.
fn print_dry_run(pipeline: &Pipeline<'_>) -> Result<()> {
    let cfg = pipeline.config();
    let scratch = MockFileSystem::new();
    scratch.add_dir(&cfg.workflow.input_directory);
    for input in pipeline.discover_inputs()? {
        scratch.add_file(&input, Vec::new());
    }
    let mut dag = JobDag::new(MemoryStore::new(cfg.session()));
    Pipeline::new(cfg, &scratch).generate(&mut dag)?;
    let view = dag.view()?;

    println!("sdaflow dry-run");
    println!("  workflow.id = {}", cfg.workflow.id);
    println!("  last_job_type = {}", cfg.last_job_type);
    println!("  concurrency = {}", cfg.scheduler.concurrency);
    println!("  failure_policy = {:?}", cfg.scheduler.failure_policy);
    println!();

    let order = view
        .topological_order()
        .map_err(|id| anyhow::anyhow!("generated DAG has a cycle through job {id}"))?;
    println!("jobs ({}), edges ({}):", view.len(), view.edge_count());
    for id in order {
        let Some(job) = view.job(id) else { continue };
        println!("  - {} [{}] {}", job.id, job.job_type, job.file.display());
        let successors = view.successors(id);
        if !successors.is_empty() {
            println!("      before: {:?}", successors);
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

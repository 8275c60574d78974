// src/engine/pipeline.rs

//! End-to-end settlement delineation workflow.
//!
//! [`Pipeline::run`] performs, in order:
//! 1. optional cleanup of a previous workflow (`cleanup_before`); without
//!    it, a store that already holds jobs is refused,
//! 2. input discovery in the input directory,
//! 3. job generation up to the Components stage,
//! 4. a scheduler run,
//! 5. when the last stage is Merge: the merge jobs over all analysis
//!    outputs, followed by a second scheduler run,
//! 6. optional cleanup when nothing failed (`cleanup_after`).

use std::path::{Path, PathBuf};

use globset::Glob;
use tracing::{info, warn};

use crate::config::ConfigFile;
use crate::dag::{listener, JobDag, RunReport, Scheduler};
use crate::engine::recovery;
use crate::errors::{Result, SdaflowError};
use crate::exec::Executor;
use crate::fs::FileSystem;
use crate::generator::{predicates, DependencyGenerator, GeneratedJobs, GeneratorError};
use crate::job::{Job, JobPayload, JobType, JobWriter};
use crate::store::AdjacencyStore;

pub const MERGE_JOB_FILE: &str = "Merge.json";
pub const MERGE_EDGES_JOB_FILE: &str = "Merge_edges.json";

pub struct Pipeline<'a> {
    config: &'a ConfigFile,
    fs: &'a dyn FileSystem,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ConfigFile, fs: &'a dyn FileSystem) -> Self {
        Self { config, fs }
    }

    pub fn config(&self) -> &ConfigFile {
        self.config
    }

    /// Input files matching `input_pattern`, sorted so ids are stable.
    pub fn discover_inputs(&self) -> Result<Vec<PathBuf>> {
        let wf = &self.config.workflow;
        let matcher = Glob::new(&wf.input_pattern)
            .map_err(|e| SdaflowError::ConfigError(format!("invalid input_pattern: {e}")))?
            .compile_matcher();

        if !self.fs.is_dir(&wf.input_directory) {
            return Err(SdaflowError::ConfigError(format!(
                "input directory {:?} does not exist",
                wf.input_directory
            )));
        }

        let mut inputs: Vec<PathBuf> = self
            .fs
            .read_dir(&wf.input_directory)?
            .into_iter()
            .filter(|p| self.fs.is_file(p))
            .filter(|p| p.file_name().is_some_and(|name| matcher.is_match(name)))
            .collect();
        inputs.sort();
        Ok(inputs)
    }

    /// Discover inputs and generate their jobs into `dag`.
    ///
    /// Ids continue after the highest id already stored.
    pub fn generate<S: AdjacencyStore>(&self, dag: &mut JobDag<S>) -> Result<GeneratedJobs> {
        let inputs = self.discover_inputs()?;
        if inputs.is_empty() {
            return Err(SdaflowError::ConfigError(format!(
                "no input files matching '{}' in {:?}",
                self.config.workflow.input_pattern, self.config.workflow.input_directory
            )));
        }
        info!(inputs = inputs.len(), "discovered input files");

        let kind = self.config.generator.neighbour_predicate;
        let predicate = predicates::for_kind(kind)
            .map_err(|e| GeneratorError::UnknownPredicate(format!("{kind:?}: {e}")))?;

        let first_id = dag.store().max_id()?.map_or(0, |id| id + 1);
        let generator =
            DependencyGenerator::new(self.config.generator_config(first_id), predicate.as_ref(), self.fs);
        Ok(generator.generate(&inputs, dag)?)
    }

    /// A scheduler over `dag` with the built-in log listeners attached.
    pub fn scheduler<S, E>(&self, dag: JobDag<S>, executor: E) -> Scheduler<S, E>
    where
        S: AdjacencyStore + 'static,
        E: Executor,
    {
        let scheduler = Scheduler::new(dag, executor, self.config.scheduler_options());
        scheduler.add_listener(listener::log_transition);
        scheduler.add_listener(listener::log_progress);
        scheduler
    }

    /// Run the whole workflow against `dag`.
    pub async fn run<S, E>(&self, mut dag: JobDag<S>, executor: E) -> Result<RunReport>
    where
        S: AdjacencyStore + 'static,
        E: Executor,
    {
        if self.config.workflow.cleanup_before {
            recovery::cleanup(dag.store_mut(), self.fs, &self.config.workflow.job_directory)?;
        } else {
            let existing = dag.store().all_nodes()?.len();
            if existing > 0 {
                return Err(SdaflowError::ConfigError(format!(
                    "store for workflow {} already holds {existing} job(s); use `resume` or \
                     `schedule` to continue it, or set cleanup_before to start over",
                    self.config.workflow.id
                )));
            }
        }

        let generated = self.generate(&mut dag)?;
        info!(jobs = generated.len(), edges = generated.edges, "job generation complete");

        let scheduler = self.scheduler(dag, executor);
        self.finish(&scheduler).await
    }

    /// Schedule whatever the store holds, then run the merge step and the
    /// post-run cleanup as [`Pipeline::run`] would.
    pub async fn schedule<S, E>(&self, dag: JobDag<S>, executor: E) -> Result<RunReport>
    where
        S: AdjacencyStore + 'static,
        E: Executor,
    {
        let scheduler = self.scheduler(dag, executor);
        self.finish(&scheduler).await
    }

    async fn finish<S, E>(&self, scheduler: &Scheduler<S, E>) -> Result<RunReport>
    where
        S: AdjacencyStore + 'static,
        E: Executor,
    {
        let mut report = scheduler.run().await?;

        if self.config.last_job_type.includes(JobType::Merge) {
            let merge = scheduler.with_dag(|dag| self.add_merge_jobs(dag))?;
            if !merge.is_empty() {
                report.absorb(scheduler.run().await?);
            }
            self.write_config_copy();
        }

        if report.is_success() && self.config.workflow.cleanup_after {
            scheduler.with_dag(|dag| {
                recovery::cleanup(dag.store_mut(), self.fs, &self.config.workflow.job_directory)
            })?;
        } else if !report.is_success() {
            warn!(
                failed = report.failed.len(),
                "run had failures; leaving jobs and descriptions for inspection"
            );
        }
        Ok(report)
    }

    /// Create the Merge job over all analysis outputs in the working
    /// directory, plus a second one for their `_edges.shp` companions.
    ///
    /// Every stored Analysis job becomes a predecessor of the Merge jobs.
    /// Does nothing if the store already holds Merge jobs or there is no
    /// analysis output.
    pub fn add_merge_jobs<S: AdjacencyStore>(&self, dag: &mut JobDag<S>) -> Result<Vec<Job>> {
        let nodes = dag.nodes()?;
        if nodes.iter().any(|j| j.job_type == JobType::Merge) {
            return Ok(Vec::new());
        }
        let analyses: Vec<Job> = nodes
            .into_iter()
            .filter(|j| j.job_type == JobType::Analysis)
            .collect();

        let wf = &self.config.workflow;
        let (edges, outputs): (Vec<PathBuf>, Vec<PathBuf>) = self
            .analysis_outputs()?
            .into_iter()
            .partition(|p| p.to_string_lossy().ends_with("_edges.shp"));

        if outputs.is_empty() {
            warn!(
                dir = %wf.working_directory.display(),
                stem = %wf.analysis_output_stem,
                "no analysis outputs to merge"
            );
            return Ok(Vec::new());
        }

        let mut next_id = dag.store().max_id()?.map_or(0, |id| id + 1);
        let mut jobs = vec![Job::with_payload(
            next_id,
            wf.job_directory.join(MERGE_JOB_FILE),
            JobPayload::Merge {
                inputs: outputs,
                output: wf.output.clone(),
            },
        )];
        next_id += 1;

        if !edges.is_empty() {
            jobs.push(Job::with_payload(
                next_id,
                wf.job_directory.join(MERGE_EDGES_JOB_FILE),
                JobPayload::Merge {
                    inputs: edges,
                    output: with_suffix(&wf.output, "_edges"),
                },
            ));
        }

        for job in &jobs {
            JobWriter::write(self.fs, job).map_err(|source| GeneratorError::Write {
                path: job.file.clone(),
                source,
            })?;
            dag.add_node(job)?;
            for analysis in &analyses {
                dag.add_edge(analysis, job)?;
            }
            info!(
                job = job.id,
                file = %job.file.display(),
                after = analyses.len(),
                "added merge job"
            );
        }
        Ok(jobs)
    }

    fn analysis_outputs(&self) -> Result<Vec<PathBuf>> {
        let wf = &self.config.workflow;
        if !self.fs.is_dir(&wf.working_directory) {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = self
            .fs
            .read_dir(&wf.working_directory)?
            .into_iter()
            .filter(|p| self.fs.is_file(p))
            .filter(|p| {
                let stem_matches = p
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.starts_with(&wf.analysis_output_stem));
                stem_matches && p.extension().is_some_and(|ext| ext == "shp")
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Keep the stage configuration next to the merged output.
    fn write_config_copy(&self) {
        let wf = &self.config.workflow;
        let target = with_suffix(&wf.output, "_cfg").with_extension("json");
        let copied = self
            .fs
            .read_to_string(&wf.stage_config)
            .and_then(|contents| self.fs.write(&target, contents.as_bytes()));
        if let Err(err) = copied {
            warn!(target = %target.display(), error = %err, "could not copy stage configuration");
        }
    }
}

/// `dir/name.ext` -> `dir/name<suffix>.ext`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_goes_before_the_extension() {
        assert_eq!(
            with_suffix(Path::new("out/result.shp"), "_edges"),
            PathBuf::from("out/result_edges.shp")
        );
        assert_eq!(
            with_suffix(Path::new("out/result.shp"), "_cfg").with_extension("json"),
            PathBuf::from("out/result_cfg.json")
        );
        assert_eq!(with_suffix(Path::new("result"), "_x"), PathBuf::from("result_x"));
    }
}

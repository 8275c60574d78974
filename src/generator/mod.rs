// src/generator/mod.rs

//! Job generation: turns a list of input files into the Filter,
//! Neighbours and Components jobs of one workflow and wires their edges.
//!
//! - One Filter job per input, no incoming edges.
//! - One Neighbours job per input, depending on its own Filter job and on
//!   the Filter job of every input the [`NeighbourPredicate`] accepts.
//! - One Components job depending on every Neighbours job.
//!
//! Ids are handed out monotonically in input order, stage by stage. Each
//! job's description file is written before the job is registered in the
//! store, so an interrupted generation leaves only complete jobs behind.
//! Generation stops after the configured last stage; later stages
//! (Contraction onwards) are created by the Components job itself and by
//! the pipeline's merge step.

pub mod predicates;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::dag::JobDag;
use crate::fs::FileSystem;
use crate::job::{Job, JobId, JobPayload, JobType, JobWriter};
use crate::store::{AdjacencyStore, StoreError};

pub use predicates::{NeighbourPredicate, TilesPredicate, WsfPredicate};

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("unknown last job type: {0}")]
    UnknownLastStage(String),

    #[error("unknown neighbour predicate: {0}")]
    UnknownPredicate(String),

    #[error("no input files to generate jobs for")]
    NoInputs,

    #[error("failed to write job description {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Where job description files are written.
    pub job_directory: PathBuf,
    /// Where the stage tools write their outputs.
    pub working_directory: PathBuf,
    /// Stage configuration file handed to every job.
    pub stage_config: PathBuf,
    pub last_job_type: JobType,
    /// First id to hand out.
    pub first_id: JobId,
}

/// Jobs created by one [`DependencyGenerator::generate`] call.
#[derive(Debug, Clone, Default)]
pub struct GeneratedJobs {
    pub filters: Vec<Job>,
    pub neighbours: Vec<Job>,
    pub components: Option<Job>,
    /// Number of edges registered.
    pub edges: usize,
}

impl GeneratedJobs {
    pub fn len(&self) -> usize {
        self.filters.len() + self.neighbours.len() + usize::from(self.components.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Next free id after everything generated.
    pub fn next_id(&self) -> Option<JobId> {
        self.components
            .iter()
            .chain(&self.neighbours)
            .chain(&self.filters)
            .map(|j| j.id)
            .max()
            .map(|id| id + 1)
    }
}

pub struct DependencyGenerator<'a> {
    config: GeneratorConfig,
    predicate: &'a dyn NeighbourPredicate,
    fs: &'a dyn FileSystem,
}

impl<'a> DependencyGenerator<'a> {
    pub fn new(
        config: GeneratorConfig,
        predicate: &'a dyn NeighbourPredicate,
        fs: &'a dyn FileSystem,
    ) -> Self {
        Self {
            config,
            predicate,
            fs,
        }
    }

    /// Create and register all jobs for `inputs` up to the last stage.
    pub fn generate<S: AdjacencyStore>(
        &self,
        inputs: &[PathBuf],
        dag: &mut JobDag<S>,
    ) -> Result<GeneratedJobs, GeneratorError> {
        let last = self.config.last_job_type;
        if last == JobType::Undefined {
            return Err(GeneratorError::UnknownLastStage(last.to_string()));
        }
        if inputs.is_empty() {
            return Err(GeneratorError::NoInputs);
        }

        let mut next_id = self.config.first_id;
        let mut out = GeneratedJobs::default();

        for input in inputs {
            let job = Job::with_payload(
                next_id,
                self.job_file("Filter_", input),
                JobPayload::Filter {
                    input: input.clone(),
                    config: self.config.stage_config.clone(),
                },
            );
            next_id += 1;
            self.write(&job)?;
            dag.add_node(&job)?;
            out.filters.push(job);
        }
        info!(count = out.filters.len(), "generated filter jobs");

        if !last.includes(JobType::Neighbours) {
            return Ok(out);
        }

        for (i, input) in inputs.iter().enumerate() {
            let neighbours: Vec<usize> = (0..inputs.len())
                .filter(|&j| j != i && self.predicate.are_neighbours(input, &inputs[j]))
                .collect();

            let job = Job::with_payload(
                next_id,
                self.job_file("Neighbour_", input),
                JobPayload::Neighbours {
                    primary_input: self.filtered_output(input),
                    additional_input: neighbours
                        .iter()
                        .map(|&j| self.filtered_output(&inputs[j]))
                        .collect(),
                    config: self.config.stage_config.clone(),
                },
            );
            next_id += 1;
            self.write(&job)?;

            dag.add_edge(&out.filters[i], &job)?;
            for &j in &neighbours {
                dag.add_edge(&out.filters[j], &job)?;
            }
            out.edges += 1 + neighbours.len();
            debug!(job = job.id, input = %input.display(), neighbours = neighbours.len(), "neighbours job");
            out.neighbours.push(job);
        }
        info!(count = out.neighbours.len(), edges = out.edges, "generated neighbours jobs");

        if !last.includes(JobType::Components) {
            return Ok(out);
        }

        let id = next_id;
        let job = Job::with_payload(
            id,
            self.config.job_directory.join("ComponentsJob.json"),
            JobPayload::Components {
                config: self.config.stage_config.clone(),
                job_directory: self.config.job_directory.clone(),
                next_job_id: id + 1,
            },
        );
        self.write(&job)?;
        dag.add_node(&job)?;
        for neighbours in &out.neighbours {
            dag.add_edge(neighbours, &job)?;
        }
        out.edges += out.neighbours.len();
        info!(job = id, "generated components job");
        out.components = Some(job);

        Ok(out)
    }

    fn job_file(&self, prefix: &str, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.config.job_directory.join(format!("{prefix}{stem}.json"))
    }

    /// `<working_dir>/<stem>_filtered.shp`, the Filter stage's output.
    fn filtered_output(&self, input: &Path) -> PathBuf {
        filtered_output(&self.config.working_directory, input)
    }

    fn write(&self, job: &Job) -> Result<(), GeneratorError> {
        JobWriter::write(self.fs, job).map_err(|source| GeneratorError::Write {
            path: job.file.clone(),
            source,
        })
    }
}

/// Output path of the Filter job for `input`.
pub fn filtered_output(working_directory: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    working_directory.join(format!("{stem}_filtered.shp"))
}

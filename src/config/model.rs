// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::SchedulerOptions;
use crate::exec::CommandSpec;
use crate::generator::GeneratorConfig;
use crate::job::{JobId, JobType};
use crate::store::Session;
use crate::types::{ExecutorKind, FailurePolicy, PredicateKind};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [workflow]
/// id = 7
/// input_directory = "data/in"
/// working_directory = "data/work"
/// job_directory = "data/jobs"
/// output = "data/out/settlements.shp"
/// last_job_type = "analysis"
/// stage_config = "sda.json"
///
/// [generator]
/// neighbour_predicate = "wsf"
///
/// [scheduler]
/// concurrency = 8
/// failure_policy = "cascade"
///
/// [executor]
/// kind = "toil"
/// tool_directory = "cwl"
/// ```
///
/// Only `[workflow]` is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    pub workflow: WorkflowSection,

    #[serde(default)]
    pub generator: GeneratorSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub store: StoreSection,
}

/// `[workflow]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowSection {
    /// Store session; separate ids never see each other's jobs.
    #[serde(default)]
    pub id: u64,

    pub input_directory: PathBuf,
    pub working_directory: PathBuf,
    pub job_directory: PathBuf,

    /// Final merged output file.
    pub output: PathBuf,

    /// Name of the last stage to run (`filter` .. `merge`).
    #[serde(default = "default_last_job_type")]
    pub last_job_type: String,

    /// Stage configuration handed to every job.
    pub stage_config: PathBuf,

    /// File stem the analysis stage writes its results under.
    #[serde(default = "default_analysis_output_stem")]
    pub analysis_output_stem: String,

    #[serde(default)]
    pub cleanup_before: bool,

    #[serde(default)]
    pub cleanup_after: bool,

    /// Glob selecting input files inside `input_directory`.
    #[serde(default = "default_input_pattern")]
    pub input_pattern: String,
}

fn default_last_job_type() -> String {
    "merge".to_string()
}

fn default_analysis_output_stem() -> String {
    "analysis".to_string()
}

fn default_input_pattern() -> String {
    "*.{shp,tif,tiff}".to_string()
}

/// `[generator]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorSection {
    #[serde(default = "default_neighbour_predicate")]
    pub neighbour_predicate: PredicateKind,
}

fn default_neighbour_predicate() -> PredicateKind {
    PredicateKind::Tiles
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            neighbour_predicate: default_neighbour_predicate(),
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSection {
    /// Maximum number of jobs in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSection {
    #[serde(default)]
    pub kind: ExecutorKind,

    /// Override for the runner binary; defaults to the kind's runner.
    #[serde(default)]
    pub program: Option<String>,

    /// Directory holding `<stage>.cwl` tool descriptions.
    #[serde(default = "default_tool_directory")]
    pub tool_directory: PathBuf,

    /// Extra arguments placed before the tool description.
    #[serde(default)]
    pub flags: Vec<String>,
}

fn default_tool_directory() -> PathBuf {
    PathBuf::from("cwl")
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::default(),
            program: None,
            tool_directory: default_tool_directory(),
            flags: Vec::new(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Directory of the persistent job store; defaults to
    /// `<working_directory>/store`.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Validated configuration.
///
/// Built from a [`RawConfigFile`] via `TryFrom` (see `validate.rs`). Raw
/// sections are kept as-is; only fields that need resolving are replaced by
/// typed values.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub workflow: WorkflowSection,
    pub last_job_type: JobType,
    pub generator: GeneratorSection,
    pub scheduler: SchedulerSection,
    pub executor: ExecutorSection,
    pub store: StoreSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, last_job_type: JobType) -> Self {
        Self {
            workflow: raw.workflow,
            last_job_type,
            generator: raw.generator,
            scheduler: raw.scheduler,
            executor: raw.executor,
            store: raw.store,
        }
    }

    pub fn session(&self) -> Session {
        Session::new(self.workflow.id)
    }

    pub fn store_directory(&self) -> PathBuf {
        self.store
            .directory
            .clone()
            .unwrap_or_else(|| self.workflow.working_directory.join("store"))
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            last_job_type: self.last_job_type,
            concurrency: self.scheduler.concurrency,
            poll_interval: Duration::from_millis(self.scheduler.poll_interval_ms),
            failure_policy: self.scheduler.failure_policy,
        }
    }

    pub fn generator_config(&self, first_id: JobId) -> GeneratorConfig {
        GeneratorConfig {
            job_directory: self.workflow.job_directory.clone(),
            working_directory: self.workflow.working_directory.clone(),
            stage_config: self.workflow.stage_config.clone(),
            last_job_type: self.last_job_type,
            first_id,
        }
    }

    pub fn command_spec(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(self.executor.kind, &self.executor.tool_directory);
        if let Some(program) = &self.executor.program {
            spec.program = program.clone();
        }
        spec.flags = self.executor.flags.clone();
        spec
    }
}

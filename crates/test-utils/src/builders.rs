#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sdaflow::config::{
    ConfigFile, ExecutorSection, GeneratorSection, RawConfigFile, SchedulerSection, StoreSection,
    WorkflowSection,
};
use sdaflow::dag::JobDag;
use sdaflow::job::{Job, JobId, JobState, JobType};
use sdaflow::store::{AdjacencyStore, MemoryStore, Session};
use sdaflow::types::{FailurePolicy, PredicateKind};

/// Builder for `ConfigFile` rooted at one directory:
/// `<root>/in`, `<root>/work`, `<root>/jobs`, `<root>/out/result.shp` and
/// `<root>/sda.json`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config: RawConfigFile {
                workflow: WorkflowSection {
                    id: 0,
                    input_directory: root.join("in"),
                    working_directory: root.join("work"),
                    job_directory: root.join("jobs"),
                    output: root.join("out").join("result.shp"),
                    last_job_type: "components".to_string(),
                    stage_config: root.join("sda.json"),
                    analysis_output_stem: "analysis".to_string(),
                    cleanup_before: false,
                    cleanup_after: false,
                    input_pattern: "*.{shp,tif,tiff}".to_string(),
                },
                generator: GeneratorSection::default(),
                scheduler: SchedulerSection {
                    concurrency: 4,
                    poll_interval_ms: 20,
                    failure_policy: FailurePolicy::Permissive,
                },
                executor: ExecutorSection::default(),
                store: StoreSection {
                    directory: Some(root.join("store")),
                },
            },
        }
    }

    pub fn workflow_id(mut self, id: u64) -> Self {
        self.config.workflow.id = id;
        self
    }

    pub fn last_job_type(mut self, last: &str) -> Self {
        self.config.workflow.last_job_type = last.to_string();
        self
    }

    pub fn predicate(mut self, kind: PredicateKind) -> Self {
        self.config.generator.neighbour_predicate = kind;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.scheduler.concurrency = n;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.scheduler.failure_policy = policy;
        self
    }

    pub fn cleanup_before(mut self, on: bool) -> Self {
        self.config.workflow.cleanup_before = on;
        self
    }

    pub fn cleanup_after(mut self, on: bool) -> Self {
        self.config.workflow.cleanup_after = on;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for a `JobDag` with explicit ids, types, states and edges.
///
/// Job files are named `<id>.json`.
#[derive(Default)]
pub struct DagBuilder {
    jobs: Vec<Job>,
    edges: Vec<(JobId, JobId)>,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(self, id: JobId, job_type: JobType) -> Self {
        self.job_in(id, job_type, JobState::Runnable)
    }

    pub fn job_in(mut self, id: JobId, job_type: JobType, state: JobState) -> Self {
        self.jobs
            .push(Job::new(id, PathBuf::from(format!("{id}.json")), job_type).in_state(state));
        self
    }

    pub fn edge(mut self, from: JobId, to: JobId) -> Self {
        self.edges.push((from, to));
        self
    }

    pub fn build(self) -> JobDag<MemoryStore> {
        self.build_into(MemoryStore::new(Session::default()))
    }

    pub fn build_into<S: AdjacencyStore>(self, store: S) -> JobDag<S> {
        let mut dag = JobDag::new(store);
        for job in &self.jobs {
            dag.add_node(job).expect("add_node");
        }
        for (from, to) in self.edges {
            let from = self.jobs.iter().find(|j| j.id == from).expect("unknown edge source");
            let to = self.jobs.iter().find(|j| j.id == to).expect("unknown edge target");
            dag.add_edge(from, to).expect("add_edge");
        }
        dag
    }
}

/// Current `(id, state)` of every job in `dag`, ascending by id.
pub fn states<S: AdjacencyStore>(dag: &JobDag<S>) -> Vec<(JobId, JobState)> {
    dag.nodes()
        .expect("nodes")
        .into_iter()
        .map(|j| (j.id, j.state))
        .collect()
}

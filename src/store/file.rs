// src/store/file.rs

//! Crash-safe JSON document store.
//!
//! One document per session lives at `<dir>/workflow-<id>.json`. Every
//! mutation rewrites the full document to a temporary sibling and renames it
//! into place, so a reader (or a restarted process) sees either the previous
//! or the new snapshot, never a torn write.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::job::{Job, JobId, JobState};
use crate::store::memory::Graph;
use crate::store::{AdjacencyStore, Session, StoreError, StoreResult};

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    workflow_id: u64,
    #[serde(default)]
    jobs: Vec<Job>,
    #[serde(default)]
    edges: Vec<(JobId, JobId)>,
}

/// Durable [`AdjacencyStore`] backed by a JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    session: Session,
    path: PathBuf,
    graph: Graph,
}

impl JsonFileStore {
    /// Open (or create) the document for `session` inside `dir`.
    ///
    /// A missing document is an empty store. An unreadable or unparsable
    /// one is an error; the caller treats it as fatal.
    pub fn open(dir: impl AsRef<Path>, session: Session) -> StoreResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(format!("workflow-{}.json", session.workflow_id));
        let graph = match fs::read(&path) {
            Ok(bytes) => load_graph(&path, &bytes, session)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Graph::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        info!(
            path = %path.display(),
            workflow_id = session.workflow_id,
            jobs = graph.nodes.len(),
            edges = graph.edges.len(),
            "opened job store"
        );

        Ok(Self {
            session,
            path,
            graph,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `mutation`, persisting the document if it reports a change.
    fn mutate(&mut self, mutation: impl FnOnce(&mut Graph) -> bool) -> StoreResult<bool> {
        let mut next = self.graph.clone();
        let changed = mutation(&mut next);
        if changed {
            self.persist(&next)?;
            self.graph = next;
        }
        Ok(changed)
    }

    fn persist(&self, graph: &Graph) -> StoreResult<()> {
        let doc = Document {
            workflow_id: self.session.workflow_id,
            jobs: graph.nodes.values().cloned().collect(),
            edges: graph.edges.iter().copied().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&doc).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source: io::Error| StoreError::Io {
            path: tmp.clone(),
            source,
        };
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), jobs = doc.jobs.len(), "persisted job store");
        Ok(())
    }
}

fn load_graph(path: &Path, bytes: &[u8], session: Session) -> StoreResult<Graph> {
    let doc: Document = serde_json::from_slice(bytes).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    if doc.workflow_id != session.workflow_id {
        return Err(StoreError::Unavailable(format!(
            "{} belongs to workflow {}, not {}",
            path.display(),
            doc.workflow_id,
            session.workflow_id
        )));
    }

    let mut graph = Graph::default();
    for job in doc.jobs {
        graph.nodes.insert(job.id, job);
    }
    graph.edges.extend(doc.edges);
    Ok(graph)
}

impl AdjacencyStore for JsonFileStore {
    fn session(&self) -> Session {
        self.session
    }

    fn add_node(&mut self, job: &Job) -> StoreResult<bool> {
        self.mutate(|g| g.add_node(job))
    }

    fn add_edge(&mut self, from: &Job, to: &Job) -> StoreResult<bool> {
        self.mutate(|g| g.add_edge(from, to))
    }

    fn remove_node(&mut self, job: &Job) -> StoreResult<bool> {
        self.mutate(|g| g.remove_node(job))
    }

    fn remove_edge(&mut self, from: &Job, to: &Job) -> StoreResult<bool> {
        self.mutate(|g| g.edges.remove(&(from.id, to.id)))
    }

    fn contains(&self, job: &Job) -> StoreResult<bool> {
        Ok(self.graph.nodes.contains_key(&job.id))
    }

    fn has_edge(&self, from: &Job, to: &Job) -> StoreResult<bool> {
        Ok(self.graph.edges.contains(&(from.id, to.id)))
    }

    fn neighbours_of(&self, job: &Job) -> StoreResult<Vec<Job>> {
        Ok(self.graph.neighbours_of(job))
    }

    fn all_nodes(&self) -> StoreResult<Vec<Job>> {
        Ok(self.graph.nodes.values().cloned().collect())
    }

    fn all_edges(&self) -> StoreResult<Vec<(Job, Job)>> {
        Ok(self.graph.all_edges())
    }

    fn update_state(&mut self, job: &Job) -> StoreResult<bool> {
        self.mutate(|g| g.update_state(job))
    }

    fn clear(&mut self) -> StoreResult<()> {
        self.mutate(|g| {
            let had_content = !g.nodes.is_empty() || !g.edges.is_empty();
            g.clear();
            had_content
        })?;
        Ok(())
    }

    fn count_in_state(&self, state: JobState) -> StoreResult<usize> {
        Ok(self.graph.nodes.values().filter(|j| j.state == state).count())
    }

    fn get(&self, id: JobId) -> StoreResult<Option<Job>> {
        Ok(self.graph.nodes.get(&id).cloned())
    }
}

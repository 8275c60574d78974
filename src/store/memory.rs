// src/store/memory.rs

use std::collections::{BTreeMap, BTreeSet};

use crate::job::{Job, JobId, JobState};
use crate::store::{AdjacencyStore, Session, StoreResult, merge_node};

/// Jobs and edges of one session, held in memory.
///
/// `BTreeMap`/`BTreeSet` keep listing order deterministic (ascending id),
/// which also makes scheduling passes deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Graph {
    pub(crate) nodes: BTreeMap<JobId, Job>,
    pub(crate) edges: BTreeSet<(JobId, JobId)>,
}

impl Graph {
    pub(crate) fn add_node(&mut self, job: &Job) -> bool {
        let (changed, new) = merge_node(self.nodes.get_mut(&job.id), job);
        if let Some(new) = new {
            self.nodes.insert(new.id, new);
        }
        changed
    }

    pub(crate) fn add_edge(&mut self, from: &Job, to: &Job) -> bool {
        let mut changed = false;
        for endpoint in [from, to] {
            if !self.nodes.contains_key(&endpoint.id) {
                self.nodes.insert(endpoint.id, endpoint.clone());
                changed = true;
            }
        }
        self.edges.insert((from.id, to.id)) || changed
    }

    pub(crate) fn remove_node(&mut self, job: &Job) -> bool {
        if self.nodes.remove(&job.id).is_none() {
            return false;
        }
        self.edges.retain(|(f, t)| *f != job.id && *t != job.id);
        true
    }

    pub(crate) fn update_state(&mut self, job: &Job) -> bool {
        match self.nodes.get_mut(&job.id) {
            Some(stored) if stored.state != job.state => {
                stored.state = job.state;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn neighbours_of(&self, job: &Job) -> Vec<Job> {
        self.edges
            .range((job.id, JobId::MIN)..=(job.id, JobId::MAX))
            .filter_map(|(_, to)| self.nodes.get(to).cloned())
            .collect()
    }

    pub(crate) fn all_edges(&self) -> Vec<(Job, Job)> {
        self.edges
            .iter()
            .filter_map(|(f, t)| Some((self.nodes.get(f)?.clone(), self.nodes.get(t)?.clone())))
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

/// Volatile [`AdjacencyStore`] for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    session: Session,
    graph: Graph,
}

impl MemoryStore {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            graph: Graph::default(),
        }
    }
}

impl AdjacencyStore for MemoryStore {
    fn session(&self) -> Session {
        self.session
    }

    fn add_node(&mut self, job: &Job) -> StoreResult<bool> {
        Ok(self.graph.add_node(job))
    }

    fn add_edge(&mut self, from: &Job, to: &Job) -> StoreResult<bool> {
        Ok(self.graph.add_edge(from, to))
    }

    fn remove_node(&mut self, job: &Job) -> StoreResult<bool> {
        Ok(self.graph.remove_node(job))
    }

    fn remove_edge(&mut self, from: &Job, to: &Job) -> StoreResult<bool> {
        Ok(self.graph.edges.remove(&(from.id, to.id)))
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
        Ok(self.graph.update_state(job))
    }

    fn clear(&mut self) -> StoreResult<()> {
        self.graph.clear();
        Ok(())
    }

    fn count_in_state(&self, state: JobState) -> StoreResult<usize> {
        Ok(self.graph.nodes.values().filter(|j| j.state == state).count())
    }

    fn get(&self, id: JobId) -> StoreResult<Option<Job>> {
        Ok(self.graph.nodes.get(&id).cloned())
    }
}

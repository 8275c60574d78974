// src/dag/graph.rs

use std::collections::BTreeMap;

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{Dfs, Reversed};
use petgraph::Direction;

use crate::job::{Job, JobId};
use crate::store::{AdjacencyStore, StoreResult};

/// Job DAG backed by an [`AdjacencyStore`].
///
/// The store holds the authoritative state; `JobDag` only adds graph
/// queries on top. Edge direction is `before -> after`: for an edge
/// `(A, B)`, `B` may not start before `A` is finished.
#[derive(Debug)]
pub struct JobDag<S> {
    store: S,
}

impl<S: AdjacencyStore> JobDag<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn nodes(&self) -> StoreResult<Vec<Job>> {
        self.store.all_nodes()
    }

    pub fn add_node(&mut self, job: &Job) -> StoreResult<bool> {
        self.store.add_node(job)
    }

    /// Add `from -> to`. Keeping edges pointing forward through the stages
    /// is the caller's job.
    pub fn add_edge(&mut self, from: &Job, to: &Job) -> StoreResult<bool> {
        self.store.add_edge(from, to)
    }

    pub fn update_state(&mut self, job: &Job) -> StoreResult<bool> {
        self.store.update_state(job)
    }

    /// Number of direct predecessors of `job`.
    pub fn in_degree(&self, job: &Job) -> StoreResult<usize> {
        Ok(self.view()?.in_degree(job.id))
    }

    /// Every job from which `job` is reachable (transitive predecessors).
    pub fn ancestors_of(&self, job: &Job) -> StoreResult<Vec<Job>> {
        let view = self.view()?;
        Ok(view.ancestors_of(job.id).into_iter().cloned().collect())
    }

    /// Snapshot of all nodes and edges for one scheduling pass.
    pub fn view(&self) -> StoreResult<DagView> {
        let jobs = self.store.all_nodes()?;
        let edges = self.store.all_edges()?;
        Ok(DagView::from_parts(
            jobs,
            edges.iter().map(|(from, to)| (from.id, to.id)),
        ))
    }
}

/// Point-in-time graph of jobs, keyed by id.
#[derive(Debug, Clone)]
pub struct DagView {
    jobs: BTreeMap<JobId, Job>,
    graph: DiGraphMap<JobId, ()>,
}

impl DagView {
    pub fn from_parts(jobs: Vec<Job>, edges: impl IntoIterator<Item = (JobId, JobId)>) -> Self {
        let mut graph = DiGraphMap::new();
        let jobs: BTreeMap<JobId, Job> = jobs.into_iter().map(|j| (j.id, j)).collect();
        for id in jobs.keys() {
            graph.add_node(*id);
        }
        for (from, to) in edges {
            graph.add_edge(from, to, ());
        }
        Self { jobs, graph }
    }

    /// Jobs in ascending id order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn ids(&self) -> Vec<JobId> {
        self.jobs.keys().copied().collect()
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub(crate) fn job_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn in_degree(&self, id: JobId) -> usize {
        if !self.graph.contains_node(id) {
            return 0;
        }
        self.graph
            .neighbors_directed(id, Direction::Incoming)
            .count()
    }

    /// Direct successors of `id`, ascending.
    pub fn successors(&self, id: JobId) -> Vec<JobId> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }
        let mut out: Vec<JobId> = self
            .graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect();
        out.sort_unstable();
        out
    }

    /// Transitive predecessors of `id`, ascending, excluding `id` itself.
    pub fn ancestors_of(&self, id: JobId) -> Vec<&Job> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, id);
        let mut ids = Vec::new();
        while let Some(node) = dfs.next(reversed) {
            if node != id {
                ids.push(node);
            }
        }
        ids.sort_unstable();
        ids.into_iter().filter_map(|n| self.jobs.get(&n)).collect()
    }

    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Ids in dependency order; `Err` carries a node on a cycle.
    pub fn topological_order(&self) -> Result<Vec<JobId>, JobId> {
        toposort(&self.graph, None).map_err(|cycle| cycle.node_id())
    }
}

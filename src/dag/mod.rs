// src/dag/mod.rs

//! Job DAG representation and scheduling.
//!
//! - [`graph`] wraps an [`AdjacencyStore`](crate::store::AdjacencyStore)
//!   with graph queries (in-degree, transitive ancestors) and builds
//!   point-in-time [`DagView`] snapshots with `petgraph`.
//! - [`eligibility`] is the per-job decision taken in each scheduling pass.
//! - [`scheduler`] drives the DAG to quiescence against an executor.
//! - [`listener`] contains the built-in state-change observers.
//! - [`report`] is the summary a run returns.

pub mod eligibility;
pub mod graph;
pub mod listener;
pub mod report;
pub mod scheduler;

pub use eligibility::{decide, AbortReason, Decision, EligibilityRules};
pub use graph::{DagView, JobDag};
pub use report::{FailedJob, RunReport};
pub use scheduler::{Scheduler, SchedulerOptions, StateListener};

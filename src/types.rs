// src/types.rs

use serde::Deserialize;

use crate::job::JobState;

/// How a `Failed` ancestor affects its descendants.
///
/// - `Permissive`: `Failed` counts as finished, so descendants still run
///   once every ancestor is `Succeeded` or `Failed` (default; matches the
///   historical behaviour of the pipeline).
/// - `Cascade`: only `Succeeded` counts as finished; a `Runnable` job with
///   a `Failed` or `Aborted` ancestor is moved to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Permissive,
    Cascade,
}

impl FailurePolicy {
    /// Whether an ancestor in `state` unblocks its descendants.
    pub fn is_finished(self, state: JobState) -> bool {
        match self {
            FailurePolicy::Permissive => matches!(state, JobState::Succeeded | JobState::Failed),
            FailurePolicy::Cascade => state == JobState::Succeeded,
        }
    }

    /// Whether an ancestor in `state` dooms its descendants.
    pub fn blocks_descendants(self, state: JobState) -> bool {
        match self {
            FailurePolicy::Permissive => false,
            FailurePolicy::Cascade => matches!(state, JobState::Failed | JobState::Aborted),
        }
    }
}

/// External tool runner used by the command executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// `cwltool`, output forwarded to the log.
    #[default]
    Cwltool,
    /// `toil-cwl-runner`, output discarded.
    Toil,
}

impl ExecutorKind {
    pub fn default_program(self) -> &'static str {
        match self {
            ExecutorKind::Cwltool => "cwltool",
            ExecutorKind::Toil => "toil-cwl-runner",
        }
    }
}

/// Predicate deciding whether two input files are geometric neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateKind {
    /// `<stem>_<x>_<y>.shp` tiles; neighbours within distance 1.5.
    Tiles,
    /// `<stem>_<lon>_<lat>.<ext>` WSF files; neighbours within 2 degrees on both axes.
    Wsf,
}

// src/exec/mod.rs

//! Job execution layer.
//!
//! - [`backend`] defines the [`Executor`] trait the scheduler dispatches to,
//!   plus the completion callback type.
//! - [`command`] provides [`CommandExecutor`], which runs each job as an
//!   external CWL runner process (`cwltool` or `toil-cwl-runner`) using
//!   `tokio::process::Command`.

pub mod backend;
pub mod command;

pub use backend::{CompletionCallback, Executor};
pub use command::{CommandExecutor, CommandSpec};

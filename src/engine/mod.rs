// src/engine/mod.rs

//! Orchestration engine for sdaflow.
//!
//! This module ties together generation, scheduling and store maintenance:
//! - [`pipeline`] runs the whole workflow (generate, schedule, merge,
//!   cleanup);
//! - [`recovery`] contains the out-of-band store procedures: resume after a
//!   crash, status counts and cleanup.

pub mod pipeline;
pub mod recovery;

pub use pipeline::Pipeline;
pub use recovery::{cleanup, resume, status, StatusCounts};

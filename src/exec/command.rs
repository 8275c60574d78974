// src/exec/command.rs

//! Executor that runs one external CWL tool process per job.
//!
//! The command line is
//! `<program> <flags...> <tool_directory>/<stage>.cwl <job file>`, where
//! `<stage>` is the lowercase job type (e.g. `filter.cwl`). Exit status 0
//! means `Succeeded`; anything else (including a spawn error) is `Failed`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::exec::{CompletionCallback, Executor};
use crate::job::{Job, JobState};
use crate::types::ExecutorKind;

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub kind: ExecutorKind,
    /// Program to invoke; defaults to the kind's standard runner.
    pub program: String,
    pub tool_directory: PathBuf,
    pub flags: Vec<String>,
}

impl CommandSpec {
    pub fn new(kind: ExecutorKind, tool_directory: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            program: kind.default_program().to_string(),
            tool_directory: tool_directory.into(),
            flags: Vec::new(),
        }
    }

    /// Path of the tool description for `job`.
    pub fn tool_for(&self, job: &Job) -> PathBuf {
        self.tool_directory
            .join(format!("{}.cwl", job.job_type.as_str().to_lowercase()))
    }

    /// Full argument vector (without the program) for `job`.
    pub fn args_for(&self, job: &Job) -> Vec<String> {
        let mut args = self.flags.clone();
        args.push(path_arg(&self.tool_for(job)));
        args.push(path_arg(&job.file));
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub struct CommandExecutor {
    spec: CommandSpec,
    callback: Option<CompletionCallback>,
}

impl CommandExecutor {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            callback: None,
        }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }
}

impl Executor for CommandExecutor {
    fn set_callback(&mut self, callback: CompletionCallback) {
        self.callback = Some(callback);
    }

    fn dispatch(&self, job: Job) {
        let Some(callback) = self.callback.clone() else {
            error!(job = job.id, "dispatch without a completion callback; dropping job");
            return;
        };

        match Handle::try_current() {
            Ok(handle) => {
                let spec = self.spec.clone();
                handle.spawn(async move {
                    let outcome = run_job(&spec, &job).await;
                    complete(job, outcome, &callback);
                });
            }
            Err(err) => {
                error!(job = job.id, error = %err, "no async runtime available to run job");
                complete(job, Err(anyhow::anyhow!("no runtime")), &callback);
            }
        }
    }
}

fn complete(mut job: Job, outcome: Result<bool>, callback: &CompletionCallback) {
    let next = match outcome {
        Ok(true) => JobState::Succeeded,
        Ok(false) => JobState::Failed,
        Err(err) => {
            error!(job = job.id, file = %job.file.display(), error = %err, "job execution error");
            JobState::Failed
        }
    };
    if let Err(err) = job.transition(next) {
        warn!(job = job.id, error = %err, "unexpected job state at completion; forcing");
        job.state = next;
    }
    callback(job);
}

/// Run the tool for `job` to completion. `Ok(true)` iff it exited with 0.
async fn run_job(spec: &CommandSpec, job: &Job) -> Result<bool> {
    let args = spec.args_for(job);
    info!(
        job = job.id,
        job_type = %job.job_type,
        program = %spec.program,
        args = ?args,
        "starting job process"
    );

    let mut cmd = Command::new(&spec.program);
    cmd.args(&args).kill_on_drop(true);

    match spec.kind {
        ExecutorKind::Toil => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        ExecutorKind::Cwltool => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning {} for job {}", spec.program, job.id))?;

    // Drain both pipes so the child never blocks on a full buffer.
    if let Some(stdout) = child.stdout.take() {
        let id = job.id;
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(job = id, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let id = job.id;
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(job = id, "stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of job {}", job.id))?;

    info!(
        job = job.id,
        exit_code = status.code().unwrap_or(-1),
        success = status.success(),
        "job process exited"
    );
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobType;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn builds_tool_path_from_lowercase_stage() {
        let mut spec = CommandSpec::new(ExecutorKind::Cwltool, "/opt/cwl");
        spec.flags = vec!["--quiet".into()];
        let job = Job::new(3, "/jobs/Neighbour_a.json", JobType::Neighbours);

        assert_eq!(spec.tool_for(&job), PathBuf::from("/opt/cwl/neighbours.cwl"));
        assert_eq!(
            spec.args_for(&job),
            vec!["--quiet", "/opt/cwl/neighbours.cwl", "/jobs/Neighbour_a.json"]
        );
        assert_eq!(spec.program, "cwltool");
        assert_eq!(CommandSpec::new(ExecutorKind::Toil, "x").program, "toil-cwl-runner");
    }

    #[test]
    fn without_runtime_reports_failure_instead_of_panicking() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut exec = CommandExecutor::new(CommandSpec::new(ExecutorKind::Cwltool, "/opt/cwl"));
        exec.set_callback(Arc::new(move |job: Job| sink.lock().unwrap().push(job)));

        let job = Job::new(1, "a.json", JobType::Filter).in_state(JobState::Running);
        exec.dispatch(job);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].state, JobState::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_maps_to_terminal_state() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        for (id, program) in [(1, "true"), (2, "false"), (3, "/definitely/not/a/binary")] {
            let mut spec = CommandSpec::new(ExecutorKind::Toil, "/opt/cwl");
            spec.program = program.to_string();
            let mut exec = CommandExecutor::new(spec);
            let tx = tx.clone();
            exec.set_callback(Arc::new(move |job: Job| {
                let _ = tx.send(job);
            }));
            exec.dispatch(Job::new(id, "a.json", JobType::Filter).in_state(JobState::Running));
        }

        let mut states = Vec::new();
        for _ in 0..3 {
            let job = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("completion in time")
                .expect("channel open");
            states.push((job.id, job.state));
        }
        states.sort_by_key(|(id, _)| *id);
        assert_eq!(
            states,
            vec![
                (1, JobState::Succeeded),
                (2, JobState::Failed),
                (3, JobState::Failed)
            ]
        );
    }
}

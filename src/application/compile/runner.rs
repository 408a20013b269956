//! Child-process execution with a hard deadline.
//!
//! A run moves through `spawned -> running -> {exited | timed out | spawn failed}`;
//! [`RunOutcome`] records which terminal state was reached. On unix the engine leads
//! its own process group; the whole group is killed and the child reaped before `run`
//! returns, so helpers the engine started cannot outlive the request either.

use std::{
    ffi::OsString,
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    task::JoinHandle,
};
use tracing::{debug, warn};

/// How long to keep draining output pipes after the child exits. Grandchildren that
/// inherited the pipes could otherwise hold them open indefinitely.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// One engine execution request.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Exited(ProcessOutput),
    /// Deadline passed; the child was killed and reaped.
    TimedOut,
    SpawnFailed(String),
    /// The child started but waiting on it failed.
    WaitFailed(String),
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> RunOutcome;
}

/// Runs invocations as real child processes on the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, invocation: &Invocation) -> RunOutcome {
        let started_at = Instant::now();
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(
                    target = "application::compile::runner",
                    op = "runner::run",
                    result = "spawn_failed",
                    program = %invocation.program.display(),
                    error = %err,
                    "Failed to spawn engine process"
                );
                return RunOutcome::SpawnFailed(err.to_string());
            }
        };
        debug!(
            target = "application::compile::runner",
            op = "runner::run",
            result = "spawned",
            program = %invocation.program.display(),
            pid = child.id(),
            "Engine process spawned"
        );
        let process_group = child.id();

        let mut stdout = spawn_reader(child.stdout.take());
        let mut stderr = spawn_reader(child.stderr.take());

        match tokio::time::timeout(invocation.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                if kill_process_group(process_group) {
                    debug!(
                        target = "application::compile::runner",
                        op = "runner::run",
                        result = "stragglers_killed",
                        "Killed processes left behind by the engine"
                    );
                }
                let output = ProcessOutput {
                    exit_code: status.code(),
                    stdout: collect(&mut stdout).await,
                    stderr: collect(&mut stderr).await,
                };
                debug!(
                    target = "application::compile::runner",
                    op = "runner::run",
                    result = "exited",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    exit_code = output.exit_code.map(i64::from).unwrap_or(-1),
                    stdout_bytes = output.stdout.len(),
                    stderr_bytes = output.stderr.len(),
                    "Engine process exited"
                );
                RunOutcome::Exited(output)
            }
            Ok(Err(err)) => {
                terminate(&mut child, process_group).await;
                stdout.abort();
                stderr.abort();
                warn!(
                    target = "application::compile::runner",
                    op = "runner::run",
                    result = "wait_failed",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "Failed to wait on engine process"
                );
                RunOutcome::WaitFailed(err.to_string())
            }
            Err(_) => {
                terminate(&mut child, process_group).await;
                stdout.abort();
                stderr.abort();
                warn!(
                    target = "application::compile::runner",
                    op = "runner::run",
                    result = "timeout",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    timeout_ms = invocation.timeout.as_millis() as u64,
                    "Engine process exceeded its deadline and was killed"
                );
                RunOutcome::TimedOut
            }
        }
    }
}

/// Kill the engine's process group, then kill and reap the child itself.
async fn terminate(child: &mut tokio::process::Child, process_group: Option<u32>) {
    kill_process_group(process_group);
    if let Err(err) = child.kill().await {
        warn!(
            target = "application::compile::runner",
            op = "runner::terminate",
            result = "error",
            error = %err,
            "Failed to kill engine process"
        );
    }
}

/// SIGKILL every process in the group led by the engine. Returns `true` if any
/// process received the signal.
#[cfg(unix)]
fn kill_process_group(leader: Option<u32>) -> bool {
    let Some(pgid) = leader.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return false;
    };
    if pgid <= 1 {
        return false;
    }
    // SAFETY: kill(2) takes no pointers; a negative pid addresses only the process
    // group created for this engine by `process_group(0)`.
    unsafe { libc::kill(-pgid, libc::SIGKILL) == 0 }
}

#[cfg(not(unix))]
fn kill_process_group(_leader: Option<u32>) -> bool {
    false
}

fn spawn_reader<R>(reader: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(mut reader) = reader {
            if let Err(err) = reader.read_to_end(&mut buffer).await {
                debug!(
                    target = "application::compile::runner",
                    op = "runner::read_output",
                    result = "error",
                    error = %err,
                    "Output pipe closed with an error"
                );
            }
        }
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

async fn collect(task: &mut JoinHandle<String>) -> String {
    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut *task).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}

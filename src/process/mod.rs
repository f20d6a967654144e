//! Subprocess boundary.
//!
//! All `docker` and `git` invocations go through a [`ProcessGateway`], so the
//! whole resolution engine can run against [`ScriptedGateway`] in tests with
//! no Docker daemon present.
//!
//! ```text
//! TargetResolver ──▶ DockerCli / git ──▶ ProcessGateway::run(request, cancel)
//!                                          ├─ TokioProcessGateway (real)
//!                                          └─ ScriptedGateway    (tests)
//! ```

mod cancel;
mod scripted;

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ProcessError;

pub use cancel::{CancelHandle, Cancellation, cancellation};
pub use scripted::{ScriptedGateway, ScriptedResponse};

/// A single external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Upper bound on runtime. `None` means the call is trusted to return.
    pub timeout: Option<Duration>,
}

impl ProcessRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Space-joined command line, used in logs and error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands. The only I/O boundary of the resolver.
#[async_trait]
pub trait ProcessGateway: Send + Sync {
    /// Run `request` to completion.
    ///
    /// A non-zero exit is *not* an error here; callers decide what it means.
    /// Errors are reserved for spawn failures, timeouts and cancellation.
    async fn run(
        &self,
        request: &ProcessRequest,
        cancel: &Cancellation,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// Real gateway backed by `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct TokioProcessGateway;

impl TokioProcessGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessGateway for TokioProcessGateway {
    async fn run(
        &self,
        request: &ProcessRequest,
        cancel: &Cancellation,
    ) -> Result<ProcessOutput, ProcessError> {
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled {
                program: request.program.clone(),
            });
        }

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::trace!(command = %request.command_line(), "Spawning process");

        let child = cmd.spawn().map_err(|e| ProcessError::SpawnFailed {
            program: request.program.clone(),
            reason: e.to_string(),
        })?;

        // Dropping the wait future drops the child, which kills it.
        let wait = child.wait_with_output();
        let result = match request.timeout {
            Some(limit) => tokio::select! {
                res = tokio::time::timeout(limit, wait) => match res {
                    Ok(res) => res,
                    Err(_) => {
                        return Err(ProcessError::TimedOut {
                            program: request.program.clone(),
                            timeout: limit,
                        });
                    }
                },
                _ = cancel.cancelled() => {
                    return Err(ProcessError::Cancelled { program: request.program.clone() });
                }
            },
            None => tokio::select! {
                res = wait => res,
                _ = cancel.cancelled() => {
                    return Err(ProcessError::Cancelled { program: request.program.clone() });
                }
            },
        };

        let output = result.map_err(|source| ProcessError::Io {
            program: request.program.clone(),
            source,
        })?;

        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_joins_program_and_args() {
        let req = ProcessRequest::new("docker").args(["context", "inspect", "default"]);
        assert_eq!(req.command_line(), "docker context inspect default");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let gw = TokioProcessGateway::new();
        let req = ProcessRequest::new("sh").args(["-c", "echo hello; exit 3"]);
        let out = gw.run(&req, &Cancellation::never()).await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "hello");
        assert!(!out.is_success());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let gw = TokioProcessGateway::new();
        let req = ProcessRequest::new("nonexistent_command_containai_12345");
        let err = gw.run(&req, &Cancellation::never()).await.unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_slow_process() {
        let gw = TokioProcessGateway::new();
        let req = ProcessRequest::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(50));
        let err = gw.run(&req, &Cancellation::never()).await.unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_spawn() {
        let gw = TokioProcessGateway::new();
        let (handle, signal) = cancellation();
        handle.cancel();
        let req = ProcessRequest::new("docker").arg("ps");
        let err = gw.run(&req, &signal).await.unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_while_running() {
        let gw = TokioProcessGateway::new();
        let (handle, signal) = cancellation();
        let req = ProcessRequest::new("sleep").arg("5");
        let run = gw.run(&req, &signal);
        handle.cancel();
        let err = run.await.unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled { .. }));
    }
}

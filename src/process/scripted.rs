//! Scripted in-memory gateway.
//!
//! Maps full command lines to canned responses and records every call, so
//! resolution can be exercised against a simulated Docker daemon.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Cancellation, ProcessGateway, ProcessOutput, ProcessRequest};
use crate::error::ProcessError;

/// What a scripted command does when invoked.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Finish with the given output.
    Output(ProcessOutput),
    /// Fail to start, as if the binary were missing.
    SpawnFailure(String),
    /// Never finish on its own; only a timeout or cancellation ends it.
    Hang,
}

/// Gateway that answers from a table of command lines.
///
/// Commands with no entry finish with exit code 1 and an empty stdout, which
/// is how `docker inspect` reports a missing object.
#[derive(Debug)]
pub struct ScriptedGateway {
    responses: HashMap<String, ScriptedResponse>,
    fallback: ScriptedResponse,
    calls: Mutex<Vec<String>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            fallback: ScriptedResponse::Output(ProcessOutput::failure(1, "Error: No such object")),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer `command_line` (program and args joined by spaces).
    pub fn on(mut self, command_line: impl Into<String>, response: ScriptedResponse) -> Self {
        self.responses.insert(command_line.into(), response);
        self
    }

    /// Shorthand for a successful command with `stdout`.
    pub fn ok(self, command_line: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.on(
            command_line,
            ScriptedResponse::Output(ProcessOutput::success(stdout)),
        )
    }

    /// Shorthand for a command exiting with `exit_code`.
    pub fn fail(self, command_line: impl Into<String>, exit_code: i32) -> Self {
        self.on(
            command_line,
            ScriptedResponse::Output(ProcessOutput::failure(exit_code, "scripted failure")),
        )
    }

    /// Response used for commands without an entry.
    pub fn with_fallback(mut self, response: ScriptedResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, command_line: &str) -> usize {
        self.calls().iter().filter(|c| *c == command_line).count()
    }
}

#[async_trait]
impl ProcessGateway for ScriptedGateway {
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

        let line = request.command_line();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        match self.responses.get(&line).unwrap_or(&self.fallback) {
            ScriptedResponse::Output(output) => Ok(output.clone()),
            ScriptedResponse::SpawnFailure(reason) => Err(ProcessError::SpawnFailed {
                program: request.program.clone(),
                reason: reason.clone(),
            }),
            ScriptedResponse::Hang => match request.timeout {
                Some(timeout) => Err(ProcessError::TimedOut {
                    program: request.program.clone(),
                    timeout,
                }),
                None => {
                    cancel.cancelled().await;
                    Err(ProcessError::Cancelled {
                        program: request.program.clone(),
                    })
                }
            },
        }
    }
}

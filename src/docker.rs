//! Thin wrapper over the `docker` CLI.
//!
//! Builds the exact argument lists the resolver relies on and interprets
//! exit codes. Every call goes through the injected [`ProcessGateway`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{ResolutionError, ResolutionResult};
use crate::process::{Cancellation, ProcessGateway, ProcessOutput, ProcessRequest};

pub const LABEL_MANAGED: &str = "containai.managed";
pub const LABEL_WORKSPACE: &str = "containai.workspace";
pub const LABEL_DATA_VOLUME: &str = "containai.data-volume";
pub const LABEL_SSH_PORT: &str = "containai.ssh-port";

/// Subset of `docker inspect --type container` output the resolver reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: InspectConfig,
    #[serde(default)]
    pub state: InspectState,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectConfig {
    /// Docker emits `null` for a container without labels.
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectState {
    #[serde(default)]
    pub status: String,
}

impl ContainerInspect {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.config
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }
}

#[derive(Clone)]
pub struct DockerCli {
    gateway: Arc<dyn ProcessGateway>,
    program: String,
}

impl std::fmt::Debug for DockerCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerCli")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl DockerCli {
    pub fn new(gateway: Arc<dyn ProcessGateway>) -> Self {
        Self {
            gateway,
            program: "docker".to_string(),
        }
    }

    fn request(&self, context: Option<&str>) -> ProcessRequest {
        let req = ProcessRequest::new(&self.program);
        match context {
            Some(ctx) => req.args(["--context", ctx]),
            None => req,
        }
    }

    async fn run(
        &self,
        request: ProcessRequest,
        cancel: &Cancellation,
    ) -> ResolutionResult<ProcessOutput> {
        let output = self.gateway.run(&request, cancel).await?;
        tracing::debug!(
            command = %request.command_line(),
            exit_code = output.exit_code,
            "docker call finished"
        );
        Ok(output)
    }

    /// `docker context inspect <name>`; exit 0 means the context exists.
    pub async fn context_exists(&self, name: &str, cancel: &Cancellation) -> ResolutionResult<bool> {
        let req = self.request(None).args(["context", "inspect", name]);
        Ok(self.run(req, cancel).await?.is_success())
    }

    /// `docker [--context c] inspect --type container <name>`; exit 0 means it exists.
    pub async fn container_exists(
        &self,
        context: Option<&str>,
        name: &str,
        cancel: &Cancellation,
    ) -> ResolutionResult<bool> {
        let req = self
            .request(context)
            .args(["inspect", "--type", "container", name]);
        Ok(self.run(req, cancel).await?.is_success())
    }

    /// Full inspect document for `name`, or `None` if the container is missing.
    ///
    /// Output that is not a non-empty JSON array fails closed.
    pub async fn inspect_container(
        &self,
        context: Option<&str>,
        name: &str,
        cancel: &Cancellation,
    ) -> ResolutionResult<Option<ContainerInspect>> {
        let req = self
            .request(context)
            .args(["inspect", "--type", "container", name]);
        let line = req.command_line();
        let output = self.run(req, cancel).await?;
        if !output.is_success() {
            return Ok(None);
        }

        let mut docs: Vec<ContainerInspect> = serde_json::from_str(output.stdout.trim())
            .map_err(|e| {
                ResolutionError::process_failure(&line, format!("unparseable inspect output: {e}"))
            })?;
        if docs.is_empty() {
            return Err(ResolutionError::process_failure(
                &line,
                "inspect returned no documents",
            ));
        }
        Ok(Some(docs.swap_remove(0)))
    }

    /// Ids of every container (running or not) labelled with `workspace`.
    pub async fn workspace_container_ids(
        &self,
        context: Option<&str>,
        workspace: &str,
        cancel: &Cancellation,
    ) -> ResolutionResult<Vec<String>> {
        let req = self.request(context).args([
            "ps".to_string(),
            "-aq".to_string(),
            "--filter".to_string(),
            format!("label={LABEL_WORKSPACE}={workspace}"),
        ]);
        let line = req.command_line();
        let output = self.run(req, cancel).await?;
        if !output.is_success() {
            return Err(ResolutionError::process_failure(
                line,
                failure_reason(&output),
            ));
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Current name of the container with `id`, without Docker's leading `/`.
    pub async fn container_name_by_id(
        &self,
        context: Option<&str>,
        id: &str,
        cancel: &Cancellation,
    ) -> ResolutionResult<String> {
        let req = self
            .request(context)
            .args(["inspect", "--format", "{{.Name}}", id]);
        let line = req.command_line();
        let output = self.run(req, cancel).await?;
        if !output.is_success() {
            return Err(ResolutionError::process_failure(
                line,
                failure_reason(&output),
            ));
        }
        let name = output.stdout.trim().trim_start_matches('/');
        if name.is_empty() {
            return Err(ResolutionError::process_failure(line, "empty container name"));
        }
        Ok(name.to_string())
    }
}

fn failure_reason(output: &ProcessOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("exit code {}", output.exit_code)
    } else {
        format!("exit code {}: {}", output.exit_code, stderr)
    }
}

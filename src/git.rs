//! Best-effort git branch lookup used when naming containers and volumes.

use std::path::Path;
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::process::{Cancellation, ProcessGateway, ProcessRequest};

/// Branch placeholder used when the branch cannot be determined.
pub const NO_GIT: &str = "nogit";

/// Placeholder for a detached HEAD.
pub const DETACHED: &str = "detached";

/// Current branch of the repository containing `workspace`.
///
/// Runs `git -C <workspace> rev-parse --abbrev-ref HEAD` within `timeout`.
/// Never fails: a missing git binary, a non-repository, a timeout or any
/// other problem yields [`NO_GIT`]. Cancellation also degrades, and the next
/// Docker call reports it.
pub async fn current_branch(
    gateway: &dyn ProcessGateway,
    workspace: &Path,
    timeout: Duration,
    cancel: &Cancellation,
) -> String {
    let req = ProcessRequest::new("git")
        .arg("-C")
        .arg(workspace.display().to_string())
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .timeout(timeout);

    match gateway.run(&req, cancel).await {
        Ok(output) if output.is_success() => match output.stdout.trim() {
            "" => NO_GIT.to_string(),
            "HEAD" => DETACHED.to_string(),
            branch => branch.to_string(),
        },
        Ok(output) => {
            tracing::debug!(
                workspace = %workspace.display(),
                exit_code = output.exit_code,
                "git branch lookup failed, using '{NO_GIT}'"
            );
            NO_GIT.to_string()
        }
        Err(e) => {
            tracing::debug!(workspace = %workspace.display(), error = %e, "git branch lookup failed, using '{NO_GIT}'");
            NO_GIT.to_string()
        }
    }
}

/// Branch of one workspace, looked up at most once per resolution.
pub struct BranchProbe<'a> {
    gateway: &'a dyn ProcessGateway,
    workspace: &'a Path,
    timeout: Duration,
    branch: OnceCell<String>,
}

impl<'a> BranchProbe<'a> {
    pub fn new(gateway: &'a dyn ProcessGateway, workspace: &'a Path, timeout: Duration) -> Self {
        Self {
            gateway,
            workspace,
            timeout,
            branch: OnceCell::new(),
        }
    }

    pub async fn branch(&self, cancel: &Cancellation) -> &str {
        self.branch
            .get_or_init(|| current_branch(self.gateway, self.workspace, self.timeout, cancel))
            .await
    }
}

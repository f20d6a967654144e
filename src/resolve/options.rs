//! Session command options and their mutual-exclusion rules.

use std::path::PathBuf;

use crate::error::{ResolutionError, ResolutionResult};

/// Kind of session being started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Interactive shell.
    Shell,
    /// One-off command.
    Run,
    /// Command in an existing session container.
    Exec,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Run => "run",
            Self::Exec => "exec",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of one CLI invocation. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommandOptions {
    pub mode: SessionMode,
    pub workspace: Option<String>,
    pub container: Option<String>,
    pub data_volume: Option<String>,
    pub config: Option<PathBuf>,
    pub reset: bool,
    pub fresh: bool,
    pub force: bool,
    pub channel: Option<String>,
    pub image_tag: Option<String>,
    pub template: Option<String>,
}

impl SessionCommandOptions {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            workspace: None,
            container: None,
            data_volume: None,
            config: None,
            reset: false,
            fresh: false,
            force: false,
            channel: None,
            image_tag: None,
            template: None,
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_data_volume(mut self, volume: impl Into<String>) -> Self {
        self.data_volume = Some(volume.into());
        self
    }

    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    pub fn with_fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Reject contradictory options. Runs before any subprocess call.
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> ResolutionResult<()> {
        let conflict = |a: &str, b: &str| {
            Err(ResolutionError::OptionConflict(format!(
                "{a} and {b} cannot be used together"
            )))
        };

        if self.container.is_some() {
            if self.workspace.is_some() {
                return conflict("--container", "--workspace");
            }
            if self.data_volume.is_some() {
                return conflict("--container", "--data-volume");
            }
        }

        if self.mode == SessionMode::Shell && self.reset {
            if self.fresh {
                return conflict("--reset", "--fresh");
            }
            if self.container.is_some() {
                return conflict("--reset", "--container");
            }
            if self.data_volume.is_some() {
                return conflict("--reset", "--data-volume");
            }
        }

        Ok(())
    }
}

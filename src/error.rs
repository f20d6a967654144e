//! Error types for target resolution.
//!
//! Every resolution step returns [`ResolutionResult`]. Failures carry a
//! human-readable message and map to a small integer exit code via
//! [`ResolutionError::code`], so the CLI never surfaces an uncaught fault.

use std::path::PathBuf;
use std::time::Duration;

/// Result alias used by every resolution step.
pub type ResolutionResult<T> = Result<T, ResolutionError>;

/// Errors raised at the subprocess boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start `{program}`: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("`{program}` did not finish within {}ms", timeout.as_millis())]
    TimedOut { program: String, timeout: Duration },

    #[error("`{program}` was cancelled")]
    Cancelled { program: String },

    #[error("I/O error while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while locating or reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid value for {key}: {value} ({hint})")]
    InvalidValue {
        key: String,
        value: String,
        hint: String,
    },
}

/// Terminal failure of a resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("{0}")]
    OptionConflict(String),

    #[error("workspace not found: {}", path.display())]
    WorkspaceNotFound { path: PathBuf },

    #[error("no isolated Docker context available (tried: {tried}). Run setup or use --force")]
    NoIsolationContext { tried: String },

    #[error("container '{name}' exists in multiple contexts: {}", contexts.join(", "))]
    AmbiguousContainer { name: String, contexts: Vec<String> },

    #[error(
        "multiple containers found for workspace {workspace} in context {context}: {}",
        ids.join(", ")
    )]
    AmbiguousWorkspaceContainers {
        workspace: String,
        context: String,
        ids: Vec<String>,
    },

    #[error("invalid volume name '{name}': {reason}")]
    InvalidVolumeName { name: String, reason: String },

    #[error("invalid container name '{name}': {reason}")]
    InvalidContainerName { name: String, reason: String },

    #[error("too many container name collisions for '{base}' after {attempts} attempts")]
    NameCollisionExhausted { base: String, attempts: u32 },

    #[error(
        "container '{name}' in context {context} is not managed by ContainAI (use --force to target it anyway)"
    )]
    ContainerNotOwned { name: String, context: String },

    #[error(
        "container '{container}' uses data volume '{existing}' but '{requested}' was requested (use --fresh to recreate it)"
    )]
    VolumeMismatch {
        container: String,
        existing: String,
        requested: String,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{command} failed: {reason}")]
    ProcessFailure { command: String, reason: String },

    #[error("resolution cancelled")]
    Cancelled,
}

impl ResolutionError {
    /// Exit code reported by the CLI for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::ProcessFailure { .. } => 1,
            Self::OptionConflict(_) => 2,
            Self::WorkspaceNotFound { .. } => 3,
            Self::NoIsolationContext { .. } => 4,
            Self::AmbiguousContainer { .. } => 5,
            Self::AmbiguousWorkspaceContainers { .. } => 6,
            Self::InvalidVolumeName { .. } => 7,
            Self::NameCollisionExhausted { .. } => 8,
            Self::ContainerNotOwned { .. } => 9,
            Self::VolumeMismatch { .. } => 10,
            Self::Config(_) => 11,
            Self::InvalidContainerName { .. } => 12,
            Self::Cancelled => 130,
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProcessFailure { .. } => "process_failure",
            Self::OptionConflict(_) => "option_conflict",
            Self::WorkspaceNotFound { .. } => "workspace_not_found",
            Self::NoIsolationContext { .. } => "no_isolation_context",
            Self::AmbiguousContainer { .. } => "ambiguous_container",
            Self::AmbiguousWorkspaceContainers { .. } => "ambiguous_workspace_containers",
            Self::InvalidVolumeName { .. } => "invalid_volume_name",
            Self::NameCollisionExhausted { .. } => "name_collision_exhausted",
            Self::ContainerNotOwned { .. } => "container_not_owned",
            Self::VolumeMismatch { .. } => "volume_mismatch",
            Self::Config(_) => "config",
            Self::InvalidContainerName { .. } => "invalid_container_name",
            Self::Cancelled => "cancelled",
        }
    }

    pub(crate) fn process_failure(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProcessFailure {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

impl From<ProcessError> for ResolutionError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Cancelled { .. } => Self::Cancelled,
            ProcessError::SpawnFailed { ref program, .. }
            | ProcessError::TimedOut { ref program, .. }
            | ProcessError::Io { ref program, .. } => Self::ProcessFailure {
                command: program.clone(),
                reason: err.to_string(),
            },
        }
    }
}

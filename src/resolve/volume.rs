//! Data volume resolution.
//!
//! First match wins: `--data-volume` > `$CONTAINAI_DATA_VOLUME` > workspace
//! `data_volume` > global `agent.data_volume` > `containai-data`. Under
//! `--reset` a fresh name is generated instead.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{ConfigSource, ENV_DATA_VOLUME, Environment, ResolverSettings};
use crate::error::{ResolutionError, ResolutionResult};
use crate::git::BranchProbe;
use crate::process::Cancellation;
use crate::resolve::clock::Clock;
use crate::resolve::naming::workspace_dirname;
use crate::resolve::options::{SessionCommandOptions, SessionMode};

pub const VOLUME_NAME_MAX_LEN: usize = 255;
pub const WORKSPACE_VOLUME_KEY: &str = "data_volume";
pub const GLOBAL_VOLUME_KEY: &str = "agent.data_volume";

static VOLUME_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("static regex"));

/// Which layer supplied the volume name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSource {
    Option,
    Environment,
    WorkspaceConfig,
    GlobalConfig,
    Default,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeResolution {
    pub name: String,
    pub source: VolumeSource,
}

impl VolumeResolution {
    pub fn generated_from_reset(&self) -> bool {
        self.source == VolumeSource::Reset
    }
}

/// Check `name` against Docker's volume naming rule. Never corrects it.
pub fn validate_volume_name(name: &str) -> ResolutionResult<()> {
    let invalid = |reason: &str| {
        Err(ResolutionError::InvalidVolumeName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };
    if name.is_empty() {
        return invalid("name is empty");
    }
    if name.len() > VOLUME_NAME_MAX_LEN {
        return invalid("longer than 255 characters");
    }
    if !VOLUME_NAME.is_match(name) {
        return invalid("must start with a letter or digit and contain only [A-Za-z0-9_.-]");
    }
    Ok(())
}

/// Reduce `raw` to characters valid in a volume name.
pub fn sanitize_volume_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.to_lowercase().chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out
        .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
        .trim_end_matches('-');
    if trimmed.is_empty() {
        "workspace".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{dir}-{branch}-{yyyyMMddHHmmss}` for a reset session.
pub fn reset_volume_name(workspace: &Path, branch: &str, clock: &dyn Clock) -> String {
    let ts = clock.name_timestamp();
    let head = format!(
        "{}-{}",
        sanitize_volume_component(&workspace_dirname(workspace)),
        sanitize_volume_component(branch),
    );
    // The timestamp is the unique part; trim the head instead.
    let room = VOLUME_NAME_MAX_LEN - ts.len() - 1;
    let head: String = head.chars().take(room).collect();
    format!("{}-{ts}", head.trim_end_matches('-'))
}

pub struct DataVolumeResolver<'a> {
    settings: &'a ResolverSettings,
    env: &'a Environment,
    clock: &'a dyn Clock,
}

impl<'a> DataVolumeResolver<'a> {
    pub fn new(settings: &'a ResolverSettings, env: &'a Environment, clock: &'a dyn Clock) -> Self {
        Self {
            settings,
            env,
            clock,
        }
    }

    /// Whether `options` ask for a fresh volume and the caller permits it.
    pub fn wants_reset(options: &SessionCommandOptions, allow_reset: bool) -> bool {
        allow_reset
            && options.reset
            && options.mode == SessionMode::Shell
            && options.container.is_none()
            && options.data_volume.is_none()
    }

    /// Existing volume name from the precedence chain, without reset.
    pub fn resolve_existing(
        &self,
        options: &SessionCommandOptions,
        workspace: &Path,
        config: &dyn ConfigSource,
    ) -> ResolutionResult<VolumeResolution> {
        let (name, source) = if let Some(v) = options.data_volume.as_deref() {
            (v.to_string(), VolumeSource::Option)
        } else if let Some(v) = self.env.optional(ENV_DATA_VOLUME) {
            (v.to_string(), VolumeSource::Environment)
        } else if let Some(v) = config.workspace_property(workspace, WORKSPACE_VOLUME_KEY) {
            (v, VolumeSource::WorkspaceConfig)
        } else if let Some(v) = config.global_key(GLOBAL_VOLUME_KEY) {
            (v, VolumeSource::GlobalConfig)
        } else {
            (self.settings.default_data_volume.clone(), VolumeSource::Default)
        };

        validate_volume_name(&name)?;
        tracing::debug!(volume = %name, source = ?source, "Resolved data volume");
        Ok(VolumeResolution { name, source })
    }

    /// Resolve the volume, generating a fresh one for reset sessions.
    pub async fn resolve(
        &self,
        options: &SessionCommandOptions,
        workspace: &Path,
        config: &dyn ConfigSource,
        allow_reset: bool,
        branch: &BranchProbe<'_>,
        cancel: &Cancellation,
    ) -> ResolutionResult<VolumeResolution> {
        if !Self::wants_reset(options, allow_reset) {
            return self.resolve_existing(options, workspace, config);
        }

        let name = reset_volume_name(workspace, branch.branch(cancel).await, self.clock);
        validate_volume_name(&name)?;
        tracing::info!(volume = %name, "Generated fresh data volume for reset session");
        Ok(VolumeResolution {
            name,
            source: VolumeSource::Reset,
        })
    }
}

//! Target resolution for shell, run and exec sessions.
//!
//! Two flows share the building blocks in this module's siblings:
//!
//! - workspace flow: workspace path, config, volume, context, then the
//!   container labelled with the workspace (or a freshly reserved name);
//! - explicit-container flow (`--container`): look the name up across every
//!   candidate context, falling back to the workspace flow with that name when
//!   it exists nowhere.
//!
//! Nothing here mutates Docker state. The launcher acts on the returned
//! [`ResolvedTarget`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{Channel, ContainAiConfig, Environment, ResolverSettings};
use crate::docker::DockerCli;
use crate::error::{ResolutionError, ResolutionResult};
use crate::git::BranchProbe;
use crate::process::{Cancellation, ProcessGateway};
use crate::resolve::clock::{Clock, SystemClock};
use crate::resolve::context::ContextDiscovery;
use crate::resolve::labels::LabelReader;
use crate::resolve::lookup::{ContainerLookup, ContainerMatch};
use crate::resolve::naming::{NameReservation, validate_container_name};
use crate::resolve::options::SessionCommandOptions;
use crate::resolve::volume::{DataVolumeResolver, VolumeResolution};
use crate::resolve::workspace::{find_config_file, resolve_workspace};

/// Where a session will run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    pub container_name: String,
    pub workspace: PathBuf,
    pub data_volume: String,
    pub context: String,
    /// Whether the launcher should record this target as the workspace's
    /// last-used state.
    pub should_persist_state: bool,
    pub created_by_this_invocation: bool,
    pub generated_from_reset: bool,
    pub channel: Channel,
}

pub struct TargetResolver {
    gateway: Arc<dyn ProcessGateway>,
    docker: DockerCli,
    settings: ResolverSettings,
    env: Environment,
    clock: Arc<dyn Clock>,
}

impl TargetResolver {
    pub fn new(gateway: Arc<dyn ProcessGateway>, env: Environment) -> Self {
        Self {
            docker: DockerCli::new(Arc::clone(&gateway)),
            gateway,
            settings: ResolverSettings::default(),
            env,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolve the session target for `options`.
    pub async fn resolve(
        &self,
        options: &SessionCommandOptions,
        cancel: &Cancellation,
    ) -> ResolutionResult<ResolvedTarget> {
        options.validate()?;
        if cancel.is_cancelled() {
            return Err(ResolutionError::Cancelled);
        }

        let target = match options.container.as_deref() {
            Some(name) => self.resolve_explicit(options, name, cancel).await?,
            None => self.resolve_workspace_target(options, None, cancel).await?,
        };

        tracing::info!(
            mode = %options.mode,
            container = %target.container_name,
            context = %target.context,
            volume = %target.data_volume,
            created = target.created_by_this_invocation,
            "Resolved session target"
        );
        Ok(target)
    }

    fn load_config(
        &self,
        workspace: &Path,
        options: &SessionCommandOptions,
    ) -> ResolutionResult<ContainAiConfig> {
        let config = match find_config_file(workspace, options.config.as_deref(), &self.env)? {
            Some(location) => {
                tracing::debug!(path = %location.path.display(), origin = ?location.origin, "Loading config");
                location.load()?
            }
            None => ContainAiConfig::empty(),
        };
        Ok(config)
    }

    /// Workspace flow. With `explicit_name` the label lookup is skipped and
    /// that name is created instead; reset is not honored then.
    async fn resolve_workspace_target(
        &self,
        options: &SessionCommandOptions,
        explicit_name: Option<&str>,
        cancel: &Cancellation,
    ) -> ResolutionResult<ResolvedTarget> {
        let workspace = resolve_workspace(options.workspace.as_deref(), &self.env)?;
        let config = self.load_config(&workspace, options)?;
        let channel = Channel::resolve(options.channel.as_deref(), &self.env, &config)?;
        let branch = BranchProbe::new(
            self.gateway.as_ref(),
            &workspace,
            self.settings.git_timeout,
        );

        let allow_reset = explicit_name.is_none();
        let volume = DataVolumeResolver::new(&self.settings, &self.env, self.clock.as_ref())
            .resolve(options, &workspace, &config, allow_reset, &branch, cancel)
            .await?;

        let context = ContextDiscovery::new(&self.docker, &self.settings)
            .resolve_context_for_workspace(&config, &workspace, options.force, cancel)
            .await?;

        let (container_name, created) = match explicit_name {
            Some(name) => {
                tracing::debug!(container = %name, context = %context, "Container not found, will create it");
                (name.to_string(), true)
            }
            None => {
                let workspace_label = workspace.to_string_lossy();
                match ContainerLookup::new(&self.docker)
                    .find_by_workspace(&workspace_label, &context, cancel)
                    .await?
                {
                    ContainerMatch::Found { name, .. } => {
                        self.check_volume_matches(options, &name, &context, &volume, cancel)
                            .await?;
                        (name, false)
                    }
                    ContainerMatch::NotFound => {
                        let name = NameReservation::new(
                            &self.docker,
                            &self.settings,
                            self.clock.as_ref(),
                        )
                        .reserve(&workspace, branch.branch(cancel).await, &context, cancel)
                        .await?;
                        (name, true)
                    }
                }
            }
        };

        Ok(ResolvedTarget {
            container_name,
            workspace,
            generated_from_reset: volume.generated_from_reset(),
            data_volume: volume.name,
            context,
            should_persist_state: true,
            created_by_this_invocation: created,
            channel,
        })
    }

    /// An existing container cannot have its volume swapped, so an explicit
    /// `--data-volume` must agree with the one it was created with.
    async fn check_volume_matches(
        &self,
        options: &SessionCommandOptions,
        container: &str,
        context: &str,
        volume: &VolumeResolution,
        cancel: &Cancellation,
    ) -> ResolutionResult<()> {
        if options.data_volume.is_none() || options.fresh || options.reset {
            return Ok(());
        }
        let labels = LabelReader::new(&self.docker, &self.settings)
            .read_container_labels(container, context, cancel)
            .await?;
        if !labels.data_volume.is_empty() && labels.data_volume != volume.name {
            return Err(ResolutionError::VolumeMismatch {
                container: container.to_string(),
                existing: labels.data_volume,
                requested: volume.name.clone(),
            });
        }
        Ok(())
    }

    async fn resolve_explicit(
        &self,
        options: &SessionCommandOptions,
        name: &str,
        cancel: &Cancellation,
    ) -> ResolutionResult<ResolvedTarget> {
        validate_container_name(name)?;

        // --workspace is rejected with --container, so this is the cwd.
        let cwd = resolve_workspace(None, &self.env)?;
        let config = self.load_config(&cwd, options)?;
        let discovery = ContextDiscovery::new(&self.docker, &self.settings);
        let candidates = discovery
            .build_candidate_contexts(&config, &cwd, cancel)
            .await?;
        tracing::debug!(container = %name, candidates = ?candidates, "Looking up container by name");

        let context = match ContainerLookup::new(&self.docker)
            .find_by_name(name, &candidates, cancel)
            .await?
        {
            ContainerMatch::Found { context, .. } => context,
            ContainerMatch::NotFound => {
                return self.resolve_workspace_target(options, Some(name), cancel).await;
            }
        };

        let labels = LabelReader::new(&self.docker, &self.settings)
            .read_container_labels(name, &context, cancel)
            .await?;
        if !labels.is_owned && !options.force {
            return Err(ResolutionError::ContainerNotOwned {
                name: name.to_string(),
                context,
            });
        }

        let workspace = if labels.workspace.is_empty() {
            cwd
        } else {
            PathBuf::from(&labels.workspace)
        };
        let data_volume = if labels.data_volume.is_empty() {
            DataVolumeResolver::new(&self.settings, &self.env, self.clock.as_ref())
                .resolve_existing(options, &workspace, &config)?
                .name
        } else {
            labels.data_volume
        };
        let channel = Channel::resolve(options.channel.as_deref(), &self.env, &config)?;

        Ok(ResolvedTarget {
            container_name: name.to_string(),
            workspace,
            data_volume,
            context,
            should_persist_state: false,
            created_by_this_invocation: false,
            generated_from_reset: false,
            channel,
        })
    }
}

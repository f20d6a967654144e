//! Docker context discovery.
//!
//! Resolution order for a workspace:
//!
//! ```text
//! configured context (workspace, then global) ── exists? ──▶ use it
//!        │ no
//!        ▼
//! preference list, first that exists ────────────────────▶ use it
//!        │ none
//!        ▼
//! --force ? "default" : NoIsolationContext
//! ```

use std::path::Path;

use crate::config::{ConfigSource, ResolverSettings};
use crate::docker::DockerCli;
use crate::error::{ResolutionError, ResolutionResult};
use crate::process::Cancellation;

/// Name of the chosen context, or why none could be chosen.
pub type ContextSelection = ResolutionResult<String>;

/// Workspace property naming a context.
pub const WORKSPACE_CONTEXT_KEY: &str = "context";
/// Global config key naming a context.
pub const GLOBAL_CONTEXT_KEY: &str = "docker.context";

pub struct ContextDiscovery<'a> {
    docker: &'a DockerCli,
    settings: &'a ResolverSettings,
}

impl<'a> ContextDiscovery<'a> {
    pub fn new(docker: &'a DockerCli, settings: &'a ResolverSettings) -> Self {
        Self { docker, settings }
    }

    /// Context named in config, workspace entry first.
    pub fn configured_context(config: &dyn ConfigSource, workspace: &Path) -> Option<String> {
        config
            .workspace_property(workspace, WORKSPACE_CONTEXT_KEY)
            .or_else(|| config.global_key(GLOBAL_CONTEXT_KEY))
    }

    /// Configured context if it exists on this host.
    async fn existing_configured(
        &self,
        config: &dyn ConfigSource,
        workspace: &Path,
        cancel: &Cancellation,
    ) -> ResolutionResult<Option<String>> {
        let Some(name) = Self::configured_context(config, workspace) else {
            return Ok(None);
        };
        if self.docker.context_exists(&name, cancel).await? {
            return Ok(Some(name));
        }
        tracing::warn!(context = %name, "Configured Docker context does not exist, falling back");
        Ok(None)
    }

    /// Preference-list contexts that exist, in preference order.
    async fn existing_preferred(&self, cancel: &Cancellation) -> ResolutionResult<Vec<String>> {
        let mut found = Vec::new();
        for name in &self.settings.preferred_contexts {
            if self.docker.context_exists(name, cancel).await? {
                found.push(name.clone());
            }
        }
        Ok(found)
    }

    /// Choose the context sessions for `workspace` run in.
    pub async fn resolve_context_for_workspace(
        &self,
        config: &dyn ConfigSource,
        workspace: &Path,
        force: bool,
        cancel: &Cancellation,
    ) -> ContextSelection {
        if let Some(name) = self.existing_configured(config, workspace, cancel).await? {
            tracing::debug!(context = %name, "Using configured Docker context");
            return Ok(name);
        }

        for name in &self.settings.preferred_contexts {
            if self.docker.context_exists(name, cancel).await? {
                tracing::debug!(context = %name, "Using preferred Docker context");
                return Ok(name.clone());
            }
        }

        if force {
            tracing::warn!(
                context = %self.settings.force_context,
                "No isolated Docker context found, continuing because of --force"
            );
            return Ok(self.settings.force_context.clone());
        }

        Err(ResolutionError::NoIsolationContext {
            tried: self.settings.preferred_contexts.join(", "),
        })
    }

    /// Every context a container of unknown location might live in.
    ///
    /// Configured (if it exists), then existing preference contexts, then
    /// the force context; duplicates removed, first occurrence kept.
    pub async fn build_candidate_contexts(
        &self,
        config: &dyn ConfigSource,
        workspace: &Path,
        cancel: &Cancellation,
    ) -> ResolutionResult<Vec<String>> {
        let mut candidates: Vec<String> = Vec::new();
        let configured = self.existing_configured(config, workspace, cancel).await?;
        let preferred = self.existing_preferred(cancel).await?;

        for name in configured
            .into_iter()
            .chain(preferred)
            .chain(std::iter::once(self.settings.force_context.clone()))
        {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
        Ok(candidates)
    }
}

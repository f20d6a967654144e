//! Resolver tunables and the image channel.

use std::time::Duration;

use crate::config::env::{ENV_CHANNEL, ENV_CHANNEL_SHORT, Environment};
use crate::config::file::ConfigSource;
use crate::error::ConfigError;

/// Release channel of the sandbox image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Nightly,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Nightly => "nightly",
        }
    }

    /// Resolve the channel: option > `CAI_CHANNEL` > `CONTAINAI_CHANNEL` >
    /// config `image.channel` > stable.
    pub fn resolve(
        option: Option<&str>,
        env: &Environment,
        config: &dyn ConfigSource,
    ) -> Result<Self, ConfigError> {
        let from_config = config.global_key("image.channel");
        let (key, raw) = if let Some(v) = option {
            ("--channel", v.to_string())
        } else if let Some((key, v)) = env.first_of(&[ENV_CHANNEL_SHORT, ENV_CHANNEL]) {
            (key, v.to_string())
        } else if let Some(v) = from_config {
            ("image.channel", v)
        } else {
            return Ok(Self::default());
        };

        raw.parse().map_err(|hint: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            hint,
        })
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "nightly" => Ok(Self::Nightly),
            _ => Err("expected 'stable' or 'nightly'".to_string()),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for target resolution.
///
/// Injected into the resolver rather than read from globals, so tests can
/// swap the context preference list without touching process state.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Context names probed in order when none is configured.
    pub preferred_contexts: Vec<String>,
    /// Context used with `--force` when nothing else exists.
    pub force_context: String,
    /// Volume used when no layer names one.
    pub default_data_volume: String,
    /// Image prefixes that mark a container as ours even without labels.
    pub image_prefixes: Vec<String>,
    /// Expected value of the `containai.managed` label.
    pub managed_label_value: String,
    /// Upper bound on generated container names, suffixes included.
    pub max_container_name_len: usize,
    /// Candidate names probed before giving up.
    pub max_name_attempts: u32,
    /// Budget for the git branch probe.
    pub git_timeout: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            preferred_contexts: vec![
                "containai-secure".to_string(),
                "containai-docker".to_string(),
                "containai".to_string(),
            ],
            force_context: "default".to_string(),
            default_data_volume: "containai-data".to_string(),
            image_prefixes: vec![
                "ghcr.io/containai/".to_string(),
                "containai/".to_string(),
                "containai:".to_string(),
            ],
            managed_label_value: "true".to_string(),
            max_container_name_len: 24,
            max_name_attempts: 99,
            git_timeout: Duration::from_secs(2),
        }
    }
}

impl ResolverSettings {
    pub fn with_preferred_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_container_name_len(mut self, len: usize) -> Self {
        self.max_container_name_len = len;
        self
    }
}

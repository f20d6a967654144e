//! Immutable snapshot of the process environment.
//!
//! The resolver never calls `std::env::var` directly; it reads from an
//! [`Environment`] captured once at startup, so tests can supply their own
//! values without `set_var`.

use std::collections::HashMap;
use std::path::PathBuf;

/// Override for the data volume name.
pub const ENV_DATA_VOLUME: &str = "CONTAINAI_DATA_VOLUME";
/// Release channel (short spelling, checked first).
pub const ENV_CHANNEL_SHORT: &str = "CAI_CHANNEL";
/// Release channel.
pub const ENV_CHANNEL: &str = "CONTAINAI_CHANNEL";
/// Explicit config file path.
pub const ENV_CONFIG: &str = "CONTAINAI_CONFIG";
pub const ENV_XDG_CONFIG_HOME: &str = "XDG_CONFIG_HOME";
pub const ENV_HOME: &str = "HOME";

#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
    current_dir: Option<PathBuf>,
}

impl Environment {
    /// Capture the real process environment and working directory.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
            current_dir: std::env::current_dir().ok(),
        }
    }

    /// Build a snapshot from explicit pairs (no working directory).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            current_dir: None,
        }
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Value of `key`, treating empty strings as unset.
    pub fn optional(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// First set variable among `keys`, with the key that supplied it.
    pub fn first_of<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, &str)> {
        keys.iter().find_map(|&k| self.optional(k).map(|v| (k, v)))
    }

    pub fn current_dir(&self) -> Option<&PathBuf> {
        self.current_dir.as_ref()
    }

    /// `$HOME`, falling back to the platform home directory.
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.optional(ENV_HOME)
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
    }

    /// `$XDG_CONFIG_HOME`, falling back to `~/.config`.
    pub fn config_home(&self) -> Option<PathBuf> {
        self.optional(ENV_XDG_CONFIG_HOME)
            .map(PathBuf::from)
            .or_else(|| self.home_dir().map(|h| h.join(".config")))
    }
}

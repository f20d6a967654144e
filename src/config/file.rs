//! Read-only view of a ContainAI `config.toml`.
//!
//! Writing the file belongs to the config editor; the resolver only asks two
//! questions of it: a property of one workspace, and a global key.
//!
//! ```toml
//! [agent]
//! data_volume = "team-data"
//!
//! [docker]
//! context = "containai-secure"
//!
//! [workspace."/home/me/src/app"]
//! data_volume = "app-data"
//! context = "containai-docker"
//! ```

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Access to user configuration as consumed by the resolver.
pub trait ConfigSource: Send + Sync {
    /// String property `key` from the `[workspace."<path>"]` table.
    fn workspace_property(&self, workspace: &Path, key: &str) -> Option<String>;

    /// String value at a dotted path such as `agent.data_volume`.
    fn global_key(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct ContainAiConfig {
    path: Option<PathBuf>,
    table: toml::Table,
}

impl ContainAiConfig {
    /// A config with no values.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load `path`, treating a missing file as an empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file absent, using empty config");
                Ok(Self {
                    path: Some(path.to_path_buf()),
                    table: toml::Table::new(),
                })
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Load `path`, failing if it does not exist.
    pub fn load_required(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Self::load(path)
    }

    /// Parse TOML text that came from `path`.
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let table = content
            .parse::<toml::Table>()
            .map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.message().to_string(),
            })?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            table,
        })
    }

    /// File this config was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lookup<'a>(table: &'a toml::Table, dotted: &str) -> Option<&'a toml::Value> {
        let mut parts = dotted.split('.');
        let first = parts.next()?;
        parts.try_fold(table.get(first)?, |value, part| value.as_table()?.get(part))
    }

    fn as_string(value: &toml::Value) -> Option<String> {
        match value {
            toml::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            toml::Value::Integer(i) => Some(i.to_string()),
            _ => None,
        }
    }
}

impl ConfigSource for ContainAiConfig {
    fn workspace_property(&self, workspace: &Path, key: &str) -> Option<String> {
        let workspaces = self.table.get("workspace")?.as_table()?;
        let entry = workspaces
            .get(workspace.to_string_lossy().as_ref())?
            .as_table()?;
        entry.get(key).and_then(Self::as_string)
    }

    fn global_key(&self, key: &str) -> Option<String> {
        Self::lookup(&self.table, key).and_then(Self::as_string)
    }
}

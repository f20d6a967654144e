//! Workspace path normalization and config file discovery.

use std::path::{Path, PathBuf};

use crate::config::{ContainAiConfig, ENV_CONFIG, Environment};
use crate::error::{ConfigError, ResolutionError, ResolutionResult};

/// Per-repository config location, relative to an ancestor directory.
const WORKSPACE_CONFIG: [&str; 2] = [".containai", "config.toml"];

/// Where a config file path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// `--config`; must exist.
    Option,
    /// `$CONTAINAI_CONFIG`; must exist.
    Environment,
    /// Nearest `.containai/config.toml` above the workspace.
    Workspace,
    /// User config under `$XDG_CONFIG_HOME` or `~/.config`; may be absent.
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    pub origin: ConfigOrigin,
}

impl ConfigLocation {
    /// Read the file. Explicit locations must exist; discovered ones may not.
    pub fn load(&self) -> Result<ContainAiConfig, ConfigError> {
        match self.origin {
            ConfigOrigin::Option | ConfigOrigin::Environment => {
                ContainAiConfig::load_required(&self.path)
            }
            ConfigOrigin::Workspace | ConfigOrigin::User => ContainAiConfig::load(&self.path),
        }
    }
}

/// Expand `~`, absolutize and canonicalize a workspace path.
///
/// `None` means the current working directory. Fails with
/// `WorkspaceNotFound` unless the result is an existing directory.
pub fn resolve_workspace(raw: Option<&str>, env: &Environment) -> ResolutionResult<PathBuf> {
    let requested = match raw {
        Some(raw) => expand_home(raw, env),
        None => env
            .current_dir()
            .cloned()
            .ok_or_else(|| ResolutionError::WorkspaceNotFound {
                path: PathBuf::from("."),
            })?,
    };

    let absolute = absolutize(requested, env);
    let canonical =
        std::fs::canonicalize(&absolute).map_err(|_| ResolutionError::WorkspaceNotFound {
            path: absolute.clone(),
        })?;

    if !canonical.is_dir() {
        return Err(ResolutionError::WorkspaceNotFound { path: canonical });
    }
    Ok(canonical)
}

/// Replace a leading `~` or `~/` with the home directory.
pub fn expand_home(raw: &str, env: &Environment) -> PathBuf {
    let rest = if raw == "~" {
        Some("")
    } else {
        raw.strip_prefix("~/")
    };
    match (rest, env.home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

fn absolutize(path: PathBuf, env: &Environment) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match env.current_dir() {
        Some(cwd) => cwd.join(path),
        None => path,
    }
}

/// Nearest `.containai/config.toml` walking up from `workspace`.
///
/// Each directory is checked before testing whether it is a VCS root, so a
/// config at the repository root is found; the walk stops after the first
/// directory containing `.git`, or at the filesystem root.
pub fn try_find_workspace_config_path(workspace: &Path) -> Option<PathBuf> {
    let mut dir = Some(workspace);
    while let Some(current) = dir {
        let candidate = WORKSPACE_CONFIG
            .iter()
            .fold(current.to_path_buf(), |p, part| p.join(part));
        if candidate.is_file() {
            return Some(candidate);
        }
        if current.join(".git").exists() {
            break;
        }
        dir = current.parent();
    }
    None
}

/// User-global config path (not checked for existence).
pub fn user_config_path(env: &Environment) -> Option<PathBuf> {
    env.config_home()
        .map(|base| base.join("containai").join("config.toml"))
}

/// Pick the config file for `workspace`.
///
/// Order: `--config` → `$CONTAINAI_CONFIG` → nearest workspace config →
/// user config. Returns `None` only when no home directory is known.
pub fn find_config_file(
    workspace: &Path,
    explicit: Option<&Path>,
    env: &Environment,
) -> Result<Option<ConfigLocation>, ConfigError> {
    let required = explicit
        .map(|p| (absolutize(p.to_path_buf(), env), ConfigOrigin::Option))
        .or_else(|| {
            env.optional(ENV_CONFIG)
                .map(|p| (absolutize(expand_home(p, env), env), ConfigOrigin::Environment))
        });

    if let Some((path, origin)) = required {
        if !path.is_file() {
            return Err(ConfigError::NotFound { path });
        }
        return Ok(Some(ConfigLocation { path, origin }));
    }

    if let Some(path) = try_find_workspace_config_path(workspace) {
        return Ok(Some(ConfigLocation {
            path,
            origin: ConfigOrigin::Workspace,
        }));
    }

    Ok(user_config_path(env).map(|path| ConfigLocation {
        path,
        origin: ConfigOrigin::User,
    }))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::ENV_HOME;

    fn write_config(dir: &Path) -> PathBuf {
        let cfg_dir = dir.join(".containai");
        fs::create_dir_all(&cfg_dir).unwrap();
        let path = cfg_dir.join("config.toml");
        fs::write(&path, "[agent]\n").unwrap();
        path
    }

    #[test]
    fn test_resolve_defaults_to_current_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::default().with_current_dir(tmp.path());
        let ws = resolve_workspace(None, &env).unwrap();
        assert_eq!(ws, tmp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_expands_tilde() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir(home.path().join("proj")).unwrap();
        let env = Environment::from_pairs([(ENV_HOME, home.path().to_str().unwrap())]);
        let ws = resolve_workspace(Some("~/proj"), &env).unwrap();
        assert_eq!(ws, home.path().join("proj").canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_relative_against_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        let env = Environment::default().with_current_dir(tmp.path());
        let ws = resolve_workspace(Some("sub"), &env).unwrap();
        assert!(ws.ends_with("sub"));
        assert!(ws.is_absolute());
    }

    #[test]
    fn test_missing_workspace_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::default();
        let missing = tmp.path().join("gone");
        let err = resolve_workspace(Some(missing.to_str().unwrap()), &env).unwrap_err();
        assert!(matches!(err, ResolutionError::WorkspaceNotFound { .. }));
        assert_eq!(err.code(), 3);
    }

    #[test]
    fn test_file_is_not_a_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        let err = resolve_workspace(Some(file.to_str().unwrap()), &Environment::default()).unwrap_err();
        assert!(matches!(err, ResolutionError::WorkspaceNotFound { .. }));
    }

    #[test]
    fn test_walk_finds_nearest_ancestor_config() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let outer = write_config(root);
        let nested = root.join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(try_find_workspace_config_path(&nested), Some(outer));

        let inner = write_config(&root.join("a"));
        assert_eq!(try_find_workspace_config_path(&nested), Some(inner));
    }

    #[test]
    fn test_walk_stops_at_vcs_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write_config(root);
        let repo = root.join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();
        let ws = repo.join("src");
        fs::create_dir_all(&ws).unwrap();
        assert_eq!(try_find_workspace_config_path(&ws), None);

        // A config at the repository root itself is still found.
        let at_root = write_config(&repo);
        assert_eq!(try_find_workspace_config_path(&ws), Some(at_root));
    }

    #[test]
    fn test_find_config_falls_back_to_user_config() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();
        let env = Environment::from_pairs([("XDG_CONFIG_HOME", "/xdg")]);
        let loc = find_config_file(&repo, None, &env).unwrap().unwrap();
        assert_eq!(loc.origin, ConfigOrigin::User);
        assert_eq!(loc.path, PathBuf::from("/xdg/containai/config.toml"));
    }

    #[test]
    fn test_explicit_config_wins_and_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = tmp.path();
        write_config(ws);
        let explicit = tmp.path().join("explicit.toml");
        fs::write(&explicit, "").unwrap();

        let env = Environment::from_pairs([(ENV_CONFIG, "/does/not/exist.toml")]);
        let loc = find_config_file(ws, Some(&explicit), &env).unwrap().unwrap();
        assert_eq!(loc.origin, ConfigOrigin::Option);

        let err = find_config_file(ws, None, &env).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}

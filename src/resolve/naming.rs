//! Container name generation and collision handling.
//!
//! Candidate names look like `{dir}-{branch}-{yyyyMMddHHmmss}` for the first
//! attempt and `{dir}-{branch}-{yyyyMMddHHmmss}-{n}` after that, with the
//! `{dir}-{branch}` core trimmed so the whole name fits the length budget.
//!
//! The availability probe is not atomic: another invocation may create the
//! same name between the probe and the launcher's `docker create`. Docker then
//! rejects the second create; this resolver never reserves anything server-side.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::ResolverSettings;
use crate::docker::DockerCli;
use crate::error::{ResolutionError, ResolutionResult};
use crate::process::Cancellation;
use crate::resolve::clock::Clock;
use crate::resolve::labels::LabelReader;

/// Hostname label limit.
pub const MAX_HOSTNAME_LEN: usize = 63;

/// Fallback when sanitizing leaves nothing.
const EMPTY_FALLBACK: &str = "workspace";

static CONTAINER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("static regex"));

/// Reject names Docker would refuse for `docker create --name`.
pub fn validate_container_name(name: &str) -> ResolutionResult<()> {
    if CONTAINER_NAME.is_match(name) {
        return Ok(());
    }
    Err(ResolutionError::InvalidContainerName {
        name: name.to_string(),
        reason: "must start with a letter or digit and contain only [a-zA-Z0-9_.-]".to_string(),
    })
}

/// Reduce `raw` to a hostname-safe label: lowercase `[a-z0-9-]`, no repeated
/// or edge dashes, at most 63 characters.
pub fn sanitize_hostname(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let mapped = match c {
            'a'..='z' | '0'..='9' => Some(c),
            'A'..='Z' => Some(c.to_ascii_lowercase()),
            '_' | '-' | '/' | '.' => Some('-'),
            c if c.is_whitespace() => Some('-'),
            _ => None,
        };
        if let Some(m) = mapped {
            if m == '-' && (out.is_empty() || out.ends_with('-')) {
                continue;
            }
            out.push(m);
        }
    }

    let trimmed = truncate(&out, MAX_HOSTNAME_LEN);
    if trimmed.is_empty() {
        EMPTY_FALLBACK.to_string()
    } else {
        trimmed
    }
}

/// First `max` characters of an ASCII name, with trailing dashes removed.
fn truncate(name: &str, max: usize) -> String {
    let cut: String = name.chars().take(max).collect();
    cut.trim_end_matches('-').to_string()
}

/// Candidate for `attempt` (1-based), never longer than `max_len`.
pub fn candidate_name(core: &str, timestamp: &str, attempt: u32, max_len: usize) -> String {
    let suffix = if attempt <= 1 {
        format!("-{timestamp}")
    } else {
        format!("-{timestamp}-{attempt}")
    };
    let core = truncate(core, max_len.saturating_sub(suffix.len()));
    let name = if core.is_empty() {
        suffix.trim_start_matches('-').to_string()
    } else {
        format!("{core}{suffix}")
    };
    truncate(&name, max_len)
}

/// Last path component of `workspace`, or a fallback for `/`.
pub fn workspace_dirname(workspace: &Path) -> String {
    workspace
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| EMPTY_FALLBACK.to_string())
}

pub struct NameReservation<'a> {
    docker: &'a DockerCli,
    settings: &'a ResolverSettings,
    clock: &'a dyn Clock,
}

impl<'a> NameReservation<'a> {
    pub fn new(docker: &'a DockerCli, settings: &'a ResolverSettings, clock: &'a dyn Clock) -> Self {
        Self {
            docker,
            settings,
            clock,
        }
    }

    /// Find a name in `context` that is free or already belongs to `workspace`.
    pub async fn reserve(
        &self,
        workspace: &Path,
        branch: &str,
        context: &str,
        cancel: &Cancellation,
    ) -> ResolutionResult<String> {
        let core = sanitize_hostname(&format!("{}-{}", workspace_dirname(workspace), branch));
        let timestamp = self.clock.name_timestamp();
        let workspace_label = workspace.to_string_lossy();
        let labels = LabelReader::new(self.docker, self.settings);
        let mut previous: Option<String> = None;
        let mut probed = 0;

        for attempt in 1..=self.settings.max_name_attempts {
            let candidate =
                candidate_name(&core, &timestamp, attempt, self.settings.max_container_name_len);
            // A budget too small for the `-{n}` suffix repeats the same name.
            if previous.as_deref() == Some(candidate.as_str()) {
                tracing::warn!(
                    container = %candidate,
                    max_len = self.settings.max_container_name_len,
                    "Name budget leaves no room for a retry suffix"
                );
                break;
            }
            probed = attempt;
            let state = labels
                .read_container_labels(&candidate, context, cancel)
                .await?;

            if !state.exists {
                tracing::debug!(container = %candidate, attempt, "Reserved container name");
                return Ok(candidate);
            }
            if state.workspace == workspace_label {
                tracing::debug!(container = %candidate, attempt, "Adopting container already labelled for this workspace");
                return Ok(candidate);
            }
            tracing::debug!(
                container = %candidate,
                owner = %state.workspace,
                "Container name taken by another workspace"
            );
            previous = Some(candidate);
        }

        Err(ResolutionError::NameCollisionExhausted {
            base: candidate_name(&core, &timestamp, 1, self.settings.max_container_name_len),
            attempts: probed,
        })
    }
}

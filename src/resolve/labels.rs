//! Container label inspection.

use crate::config::ResolverSettings;
use crate::docker::{
    ContainerInspect, DockerCli, LABEL_DATA_VOLUME, LABEL_MANAGED, LABEL_SSH_PORT, LABEL_WORKSPACE,
};
use crate::error::ResolutionResult;
use crate::process::Cancellation;

/// What Docker prints for a template lookup of a missing label.
const NO_VALUE: &str = "<no value>";

/// Snapshot of a container's ownership labels at inspection time.
///
/// May be stale as soon as it is returned: another invocation can create or
/// remove the container concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ContainerLabelState {
    pub exists: bool,
    pub is_owned: bool,
    pub workspace: String,
    pub data_volume: String,
    pub ssh_port: String,
    /// Docker status string (`running`, `exited`, ...).
    pub state: String,
}

impl ContainerLabelState {
    /// State of a container that does not exist.
    pub fn missing() -> Self {
        Self::default()
    }

    /// Derive the label state from an inspect document.
    pub fn from_inspect(doc: &ContainerInspect, settings: &ResolverSettings) -> Self {
        let label = |key| normalize(doc.label(key));
        let managed = label(LABEL_MANAGED);
        let image = &doc.config.image;

        let is_owned = managed == settings.managed_label_value
            || settings
                .image_prefixes
                .iter()
                .any(|prefix| image.starts_with(prefix.as_str()));

        Self {
            exists: true,
            is_owned,
            workspace: label(LABEL_WORKSPACE),
            data_volume: label(LABEL_DATA_VOLUME),
            ssh_port: label(LABEL_SSH_PORT),
            state: doc.state.status.clone(),
        }
    }
}

fn normalize(value: Option<&str>) -> String {
    match value.map(str::trim) {
        None | Some(NO_VALUE) => String::new(),
        Some(v) => v.to_string(),
    }
}

pub struct LabelReader<'a> {
    docker: &'a DockerCli,
    settings: &'a ResolverSettings,
}

impl<'a> LabelReader<'a> {
    pub fn new(docker: &'a DockerCli, settings: &'a ResolverSettings) -> Self {
        Self { docker, settings }
    }

    /// Labels of container `name` in `context`. A missing container is not
    /// an error; it yields [`ContainerLabelState::missing`].
    pub async fn read_container_labels(
        &self,
        name: &str,
        context: &str,
        cancel: &Cancellation,
    ) -> ResolutionResult<ContainerLabelState> {
        let state = match self
            .docker
            .inspect_container(Some(context), name, cancel)
            .await?
        {
            Some(doc) => ContainerLabelState::from_inspect(&doc, self.settings),
            None => ContainerLabelState::missing(),
        };
        tracing::debug!(
            container = %name,
            context = %context,
            exists = state.exists,
            owned = state.is_owned,
            "Read container labels"
        );
        Ok(state)
    }
}

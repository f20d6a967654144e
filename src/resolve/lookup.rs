//! Finding existing containers, by name across contexts or by workspace label.

use crate::docker::DockerCli;
use crate::error::{ResolutionError, ResolutionResult};
use crate::process::Cancellation;

/// Outcome of a lookup that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerMatch {
    /// Nothing found; the caller goes down the creation path.
    NotFound,
    Found { name: String, context: String },
}

pub struct ContainerLookup<'a> {
    docker: &'a DockerCli,
}

impl<'a> ContainerLookup<'a> {
    pub fn new(docker: &'a DockerCli) -> Self {
        Self { docker }
    }

    /// Probe every candidate context for a container called `name`.
    ///
    /// More than one hit is an error: picking one could target the wrong
    /// sandbox.
    pub async fn find_by_name(
        &self,
        name: &str,
        candidates: &[String],
        cancel: &Cancellation,
    ) -> ResolutionResult<ContainerMatch> {
        let mut hits = Vec::new();
        for context in candidates {
            if self
                .docker
                .container_exists(Some(context), name, cancel)
                .await?
            {
                hits.push(context.clone());
            }
        }

        match hits.len() {
            0 => Ok(ContainerMatch::NotFound),
            1 => Ok(ContainerMatch::Found {
                name: name.to_string(),
                context: hits.swap_remove(0),
            }),
            _ => Err(ResolutionError::AmbiguousContainer {
                name: name.to_string(),
                contexts: hits,
            }),
        }
    }

    /// Container labelled with `workspace` inside `context`.
    ///
    /// The name is re-read from the id since containers may have been renamed.
    pub async fn find_by_workspace(
        &self,
        workspace: &str,
        context: &str,
        cancel: &Cancellation,
    ) -> ResolutionResult<ContainerMatch> {
        let mut ids = self
            .docker
            .workspace_container_ids(Some(context), workspace, cancel)
            .await?;

        match ids.len() {
            0 => Ok(ContainerMatch::NotFound),
            1 => {
                let id = ids.swap_remove(0);
                let name = self
                    .docker
                    .container_name_by_id(Some(context), &id, cancel)
                    .await?;
                tracing::debug!(workspace = %workspace, container = %name, id = %id, "Found workspace container");
                Ok(ContainerMatch::Found {
                    name,
                    context: context.to_string(),
                })
            }
            _ => Err(ResolutionError::AmbiguousWorkspaceContainers {
                workspace: workspace.to_string(),
                context: context.to_string(),
                ids,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::process::ScriptedGateway;

    fn contexts() -> Vec<String> {
        vec!["containai-secure".into(), "containai-docker".into(), "default".into()]
    }

    #[tokio::test]
    async fn test_name_in_one_context() {
        let gw = ScriptedGateway::new().ok(
            "docker --context containai-docker inspect --type container box",
            "[]",
        );
        let docker = DockerCli::new(Arc::new(gw));
        let found = ContainerLookup::new(&docker)
            .find_by_name("box", &contexts(), &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(
            found,
            ContainerMatch::Found {
                name: "box".into(),
                context: "containai-docker".into()
            }
        );
    }

    #[tokio::test]
    async fn test_name_in_two_contexts_is_ambiguous() {
        let gw = ScriptedGateway::new()
            .ok("docker --context containai-secure inspect --type container box", "[]")
            .ok("docker --context default inspect --type container box", "[]");
        let docker = DockerCli::new(Arc::new(gw));
        let err = ContainerLookup::new(&docker)
            .find_by_name("box", &contexts(), &Cancellation::never())
            .await
            .unwrap_err();
        match err {
            ResolutionError::AmbiguousContainer { contexts, .. } => {
                assert_eq!(contexts, vec!["containai-secure", "default"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_name_nowhere() {
        let docker = DockerCli::new(Arc::new(ScriptedGateway::new()));
        let found = ContainerLookup::new(&docker)
            .find_by_name("box", &contexts(), &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(found, ContainerMatch::NotFound);
    }

    const PS: &str = "docker --context ctx ps -aq --filter label=containai.workspace=/repo/app";

    #[tokio::test]
    async fn test_workspace_single_container_resolves_current_name() {
        let gw = ScriptedGateway::new()
            .ok(PS, "f00d\n")
            .ok("docker --context ctx inspect --format {{.Name}} f00d", "/renamed\n");
        let docker = DockerCli::new(Arc::new(gw));
        let found = ContainerLookup::new(&docker)
            .find_by_workspace("/repo/app", "ctx", &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(
            found,
            ContainerMatch::Found {
                name: "renamed".into(),
                context: "ctx".into()
            }
        );
    }

    #[tokio::test]
    async fn test_workspace_none() {
        let docker = DockerCli::new(Arc::new(ScriptedGateway::new().ok(PS, "")));
        let found = ContainerLookup::new(&docker)
            .find_by_workspace("/repo/app", "ctx", &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(found, ContainerMatch::NotFound);
    }

    #[tokio::test]
    async fn test_workspace_multiple_is_error() {
        let docker = DockerCli::new(Arc::new(ScriptedGateway::new().ok(PS, "a1\nb2\n")));
        let err = ContainerLookup::new(&docker)
            .find_by_workspace("/repo/app", "ctx", &Cancellation::never())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::AmbiguousWorkspaceContainers { .. }));
        assert_eq!(err.code(), 6);
    }
}

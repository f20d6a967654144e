//! End-to-end resolution against a scripted Docker daemon.
//!
//! Workspaces are real temporary directories; every `docker` and `git` call
//! is answered by a `ScriptedGateway`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use containai::config::{Channel, Environment};
use containai::error::ResolutionError;
use containai::process::{Cancellation, ScriptedGateway, ScriptedResponse, cancellation};
use containai::resolve::{FixedClock, ResolvedTarget, SessionCommandOptions, SessionMode, TargetResolver};

const TS: &str = "20261016120000";

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct Fixture {
    _dir: tempfile::TempDir,
    workspace: PathBuf,
    home: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("app");
        let home = dir.path().join("home");
        std::fs::create_dir_all(workspace.join(".git")).unwrap();
        std::fs::create_dir_all(&home).unwrap();
        Self {
            workspace: std::fs::canonicalize(&workspace).unwrap(),
            home: std::fs::canonicalize(&home).unwrap(),
            _dir: dir,
        }
    }

    fn ws(&self) -> String {
        self.workspace.display().to_string()
    }

    fn env(&self) -> Environment {
        Environment::from_pairs([("HOME", self.home.display().to_string())])
            .with_current_dir(&self.workspace)
    }

    fn resolver(&self, gw: &Arc<ScriptedGateway>) -> TargetResolver {
        self.resolver_with_env(gw, self.env())
    }

    fn resolver_with_env(&self, gw: &Arc<ScriptedGateway>, env: Environment) -> TargetResolver {
        TargetResolver::new(gw.clone(), env)
            .with_clock(Arc::new(FixedClock::at(2026, 10, 16, 12, 0, 0).unwrap()))
    }

    fn git_cmd(&self) -> String {
        format!("git -C {} rev-parse --abbrev-ref HEAD", self.ws())
    }

    fn ps_cmd(&self, context: &str) -> String {
        format!(
            "docker --context {context} ps -aq --filter label=containai.workspace={}",
            self.ws()
        )
    }

    /// Host with only `containai-docker`, branch `main` and no containers.
    fn default_host(&self) -> ScriptedGateway {
        ScriptedGateway::new()
            .ok(self.git_cmd(), "main\n")
            .ok("docker context inspect containai-docker", "[]")
            .ok(self.ps_cmd("containai-docker"), "")
    }
}

fn inspect_json(managed: &str, workspace: &str, volume: &str, image: &str) -> String {
    format!(
        r#"[{{"Name":"/box","Config":{{"Image":"{image}","Labels":{{"containai.managed":"{managed}","containai.workspace":"{workspace}","containai.data-volume":"{volume}"}}}},"State":{{"Status":"running"}}}}]"#
    )
}

async fn resolve(
    fx: &Fixture,
    gw: ScriptedGateway,
    opts: SessionCommandOptions,
) -> (Result<ResolvedTarget, ResolutionError>, Arc<ScriptedGateway>) {
    let gw = Arc::new(gw);
    let result = fx.resolver(&gw).resolve(&opts, &Cancellation::never()).await;
    (result, gw)
}

fn shell() -> SessionCommandOptions {
    SessionCommandOptions::new(SessionMode::Shell)
}

// ---------------------------------------------------------------------------
// Workspace flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fresh_workspace_gets_generated_name() {
    let fx = Fixture::new();
    let (result, _) = resolve(&fx, fx.default_host(), shell()).await;
    let target = result.unwrap();

    assert_eq!(
        target,
        ResolvedTarget {
            container_name: format!("app-main-{TS}"),
            workspace: fx.workspace.clone(),
            data_volume: "containai-data".into(),
            context: "containai-docker".into(),
            should_persist_state: true,
            created_by_this_invocation: true,
            generated_from_reset: false,
            channel: Channel::Stable,
        }
    );
    assert!(target.container_name.len() <= 24);
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let fx = Fixture::new();
    let gw = Arc::new(fx.default_host());
    let resolver = fx.resolver(&gw);

    let first = resolver.resolve(&shell(), &Cancellation::never()).await.unwrap();
    let second = resolver.resolve(&shell(), &Cancellation::never()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_existing_workspace_container_is_reused() {
    let fx = Fixture::new();
    let gw = fx
        .default_host()
        .ok(fx.ps_cmd("containai-docker"), "c0ffee\n")
        .ok(
            "docker --context containai-docker inspect --format {{.Name}} c0ffee",
            "/app-main-20250101000000\n",
        );
    let (result, gw) = resolve(&fx, gw, SessionCommandOptions::new(SessionMode::Run)).await;
    let target = result.unwrap();

    assert_eq!(target.container_name, "app-main-20250101000000");
    assert!(!target.created_by_this_invocation);
    assert!(target.should_persist_state);
    // No name reservation probes.
    assert!(!gw.calls().iter().any(|c| c.contains("--type container")));
}

#[tokio::test]
async fn test_no_isolated_context() {
    let fx = Fixture::new();
    let gw = ScriptedGateway::new().ok(fx.git_cmd(), "main\n");
    let (result, _) = resolve(&fx, gw, shell()).await;
    assert_eq!(result.unwrap_err().code(), 4);

    let gw = ScriptedGateway::new()
        .ok(fx.git_cmd(), "main\n")
        .ok(fx.ps_cmd("default"), "");
    let (result, _) = resolve(&fx, gw, shell().with_force(true)).await;
    assert_eq!(result.unwrap().context, "default");
}

#[tokio::test]
async fn test_workspace_config_selects_context_and_volume() {
    let fx = Fixture::new();
    let cfg_dir = fx.workspace.join(".containai");
    std::fs::create_dir_all(&cfg_dir).unwrap();
    std::fs::write(
        cfg_dir.join("config.toml"),
        format!(
            "[docker]\ncontext = \"team-ctx\"\n\n[workspace.\"{}\"]\ndata_volume = \"app-data\"\n",
            fx.ws()
        ),
    )
    .unwrap();

    let gw = fx
        .default_host()
        .ok("docker context inspect team-ctx", "[]")
        .ok(fx.ps_cmd("team-ctx"), "");
    let (result, _) = resolve(&fx, gw, shell()).await;
    let target = result.unwrap();
    assert_eq!(target.context, "team-ctx");
    assert_eq!(target.data_volume, "app-data");
}

#[tokio::test]
async fn test_env_volume_and_channel() {
    let fx = Fixture::new();
    let gw = Arc::new(fx.default_host());
    let env = fx
        .env()
        .with_var("CONTAINAI_DATA_VOLUME", "env-vol")
        .with_var("CAI_CHANNEL", "nightly");
    let target = fx
        .resolver_with_env(&gw, env)
        .resolve(&shell(), &Cancellation::never())
        .await
        .unwrap();
    assert_eq!(target.data_volume, "env-vol");
    assert_eq!(target.channel, Channel::Nightly);
}

#[tokio::test]
async fn test_bad_channel_is_config_error() {
    let fx = Fixture::new();
    let (result, _) = resolve(&fx, fx.default_host(), shell().with_channel("beta")).await;
    assert_eq!(result.unwrap_err().code(), 11);
}

#[tokio::test]
async fn test_missing_explicit_config_is_config_error() {
    let fx = Fixture::new();
    let opts = shell().with_config(fx.home.join("nope.toml"));
    let (result, _) = resolve(&fx, fx.default_host(), opts).await;
    assert!(matches!(result.unwrap_err(), ResolutionError::Config(_)));
}

#[tokio::test]
async fn test_missing_workspace() {
    let fx = Fixture::new();
    let opts = shell().with_workspace(fx.home.join("missing").display().to_string());
    let (result, gw) = resolve(&fx, fx.default_host(), opts).await;
    assert_eq!(result.unwrap_err().code(), 3);
    assert!(gw.calls().is_empty());
}

#[tokio::test]
async fn test_volume_mismatch_on_existing_container() {
    let fx = Fixture::new();
    let host = || {
        fx.default_host()
            .ok(fx.ps_cmd("containai-docker"), "c0ffee\n")
            .ok(
                "docker --context containai-docker inspect --format {{.Name}} c0ffee",
                "/box\n",
            )
            .ok(
                "docker --context containai-docker inspect --type container box",
                inspect_json("true", &fx.ws(), "vol-a", "ubuntu"),
            )
    };

    let (result, _) = resolve(&fx, host(), shell().with_data_volume("vol-b")).await;
    assert_eq!(result.unwrap_err().code(), 10);

    let (result, _) = resolve(&fx, host(), shell().with_data_volume("vol-a")).await;
    assert_eq!(result.unwrap().data_volume, "vol-a");

    let opts = shell().with_data_volume("vol-b").with_fresh(true);
    let (result, _) = resolve(&fx, host(), opts).await;
    assert_eq!(result.unwrap().data_volume, "vol-b");
}

// ---------------------------------------------------------------------------
// Reset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_reset_generates_fresh_volume() {
    let fx = Fixture::new();
    let (result, _) = resolve(&fx, fx.default_host(), shell().with_reset(true)).await;
    let target = result.unwrap();
    assert_eq!(target.data_volume, format!("app-main-{TS}"));
    assert!(target.generated_from_reset);
    assert!(target.created_by_this_invocation);
}

#[tokio::test]
async fn test_each_reset_gets_a_new_volume() {
    let fx = Fixture::new();
    let gw = Arc::new(fx.default_host());
    let opts = shell().with_reset(true);
    let at = |min| {
        TargetResolver::new(gw.clone(), fx.env())
            .with_clock(Arc::new(FixedClock::at(2026, 10, 16, 12, min, 0).unwrap()))
    };

    let first = at(0).resolve(&opts, &Cancellation::never()).await.unwrap();
    let second = at(5).resolve(&opts, &Cancellation::never()).await.unwrap();

    assert_ne!(first.data_volume, second.data_volume);
    assert_ne!(first.data_volume, "containai-data");
    assert_ne!(second.data_volume, "containai-data");
    assert_eq!(second.data_volume, "app-main-20261016120500");
}

#[tokio::test]
async fn test_reset_conflicts() {
    let fx = Fixture::new();
    for opts in [
        shell().with_reset(true).with_fresh(true),
        shell().with_reset(true).with_container("box"),
        shell().with_reset(true).with_data_volume("vol"),
    ] {
        let (result, gw) = resolve(&fx, fx.default_host(), opts).await;
        assert_eq!(result.unwrap_err().code(), 2);
        assert!(gw.calls().is_empty());
    }
}

#[tokio::test]
async fn test_container_with_workspace_always_conflicts() {
    let fx = Fixture::new();
    for mode in [SessionMode::Shell, SessionMode::Run, SessionMode::Exec] {
        let opts = SessionCommandOptions::new(mode)
            .with_container("box")
            .with_workspace(fx.ws());
        let (result, _) = resolve(&fx, fx.default_host(), opts).await;
        assert!(matches!(result.unwrap_err(), ResolutionError::OptionConflict(_)));
    }
}

// ---------------------------------------------------------------------------
// Explicit container
// ---------------------------------------------------------------------------

fn exec_box() -> SessionCommandOptions {
    SessionCommandOptions::new(SessionMode::Exec).with_container("box")
}

#[tokio::test]
async fn test_explicit_container_found() {
    let fx = Fixture::new();
    let gw = fx.default_host().ok(
        "docker --context containai-docker inspect --type container box",
        inspect_json("true", "/srv/project", "project-data", "ubuntu"),
    );
    let (result, _) = resolve(&fx, gw, exec_box()).await;
    let target = result.unwrap();

    assert_eq!(target.container_name, "box");
    assert_eq!(target.context, "containai-docker");
    assert_eq!(target.workspace, Path::new("/srv/project"));
    assert_eq!(target.data_volume, "project-data");
    assert!(!target.created_by_this_invocation);
    assert!(!target.should_persist_state);
}

#[tokio::test]
async fn test_explicit_container_without_labels_falls_back() {
    let fx = Fixture::new();
    let gw = fx.default_host().ok(
        "docker --context containai-docker inspect --type container box",
        r#"[{"Name":"/box","Config":{"Image":"containai/agent:latest","Labels":null},"State":{"Status":"exited"}}]"#,
    );
    let (result, _) = resolve(&fx, gw, exec_box()).await;
    let target = result.unwrap();
    assert_eq!(target.workspace, fx.workspace);
    assert_eq!(target.data_volume, "containai-data");
}

#[tokio::test]
async fn test_explicit_container_not_owned() {
    let fx = Fixture::new();
    let host = || {
        fx.default_host().ok(
            "docker --context containai-docker inspect --type container box",
            inspect_json("false", "", "", "postgres:16"),
        )
    };
    let (result, _) = resolve(&fx, host(), exec_box()).await;
    assert_eq!(result.unwrap_err().code(), 9);

    let (result, _) = resolve(&fx, host(), exec_box().with_force(true)).await;
    assert_eq!(result.unwrap().container_name, "box");
}

#[tokio::test]
async fn test_explicit_container_in_two_contexts() {
    let fx = Fixture::new();
    let gw = fx
        .default_host()
        .ok("docker context inspect containai-secure", "[]")
        .ok("docker --context containai-secure inspect --type container box", "[]")
        .ok("docker --context containai-docker inspect --type container box", "[]");
    let (result, _) = resolve(&fx, gw, exec_box()).await;
    match result.unwrap_err() {
        ResolutionError::AmbiguousContainer { name, contexts } => {
            assert_eq!(name, "box");
            assert_eq!(contexts, vec!["containai-secure", "containai-docker"]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_explicit_container_not_found_is_created() {
    let fx = Fixture::new();
    let (result, gw) = resolve(&fx, fx.default_host(), exec_box()).await;
    let target = result.unwrap();

    assert_eq!(target.container_name, "box");
    assert_eq!(target.context, "containai-docker");
    assert_eq!(target.workspace, fx.workspace);
    assert!(target.created_by_this_invocation);
    assert!(target.should_persist_state);
    assert!(!target.generated_from_reset);
    // Probed the candidate contexts, never the workspace label.
    assert_eq!(gw.call_count(&fx.ps_cmd("containai-docker")), 0);
    assert_eq!(
        gw.call_count("docker --context default inspect --type container box"),
        1
    );
}

// ---------------------------------------------------------------------------
// Failures and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_docker_is_process_failure() {
    let fx = Fixture::new();
    let gw = ScriptedGateway::new()
        .ok(fx.git_cmd(), "main\n")
        .with_fallback(ScriptedResponse::SpawnFailure("No such file or directory".into()));
    let (result, _) = resolve(&fx, gw, shell()).await;
    let err = result.unwrap_err();
    assert_eq!(err.code(), 1);
    assert_eq!(err.kind(), "process_failure");
}

#[tokio::test]
async fn test_cancel_interrupts_hung_docker() {
    let fx = Fixture::new();
    let gw = Arc::new(
        fx.default_host()
            .on(fx.ps_cmd("containai-docker"), ScriptedResponse::Hang),
    );
    let resolver = fx.resolver(&gw);
    let (handle, cancel) = cancellation();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(5), resolver.resolve(&shell(), &cancel))
        .await
        .expect("resolution should stop once cancelled")
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, ResolutionError::Cancelled));
    assert_eq!(err.code(), 130);
}

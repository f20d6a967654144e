//! ContainAI - target resolution entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use containai::{
    config::Environment,
    process::{TokioProcessGateway, cancellation},
    resolve::{ResolvedTarget, SessionCommandOptions, SessionMode, TargetResolver},
};

#[derive(Parser, Debug)]
#[command(name = "containai")]
#[command(about = "Resolve the sandbox container a ContainAI session runs in")]
#[command(version)]
struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the context, container and data volume a session would use
    Resolve(ResolveArgs),
}

#[derive(clap::Args, Debug)]
struct ResolveArgs {
    /// Session kind
    #[arg(value_enum)]
    mode: ModeArg,

    /// Workspace directory (defaults to the current directory)
    #[arg(short, long)]
    workspace: Option<String>,

    /// Target a container by name
    #[arg(long)]
    container: Option<String>,

    /// Data volume to mount
    #[arg(long)]
    data_volume: Option<String>,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start over with a fresh data volume (shell only)
    #[arg(long)]
    reset: bool,

    /// Recreate the container
    #[arg(long)]
    fresh: bool,

    /// Proceed without an isolated context or ownership labels
    #[arg(long)]
    force: bool,

    /// Image channel (stable or nightly)
    #[arg(long)]
    channel: Option<String>,

    /// Image tag override, passed through to the launcher
    #[arg(long)]
    image_tag: Option<String>,

    /// Container template, passed through to the launcher
    #[arg(long)]
    template: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Shell,
    Run,
    Exec,
}

impl From<ModeArg> for SessionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Shell => SessionMode::Shell,
            ModeArg::Run => SessionMode::Run,
            ModeArg::Exec => SessionMode::Exec,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl From<ResolveArgs> for SessionCommandOptions {
    fn from(args: ResolveArgs) -> Self {
        Self {
            mode: args.mode.into(),
            workspace: args.workspace,
            container: args.container,
            data_volume: args.data_volume,
            config: args.config,
            reset: args.reset,
            fresh: args.fresh,
            force: args.force,
            channel: args.channel,
            image_tag: args.image_tag,
            template: args.template,
        }
    }
}

fn print_text(target: &ResolvedTarget) {
    println!("container:  {}", target.container_name);
    println!("context:    {}", target.context);
    println!("workspace:  {}", target.workspace.display());
    println!("volume:     {}", target.data_volume);
    println!("channel:    {}", target.channel);
    println!("created:    {}", target.created_by_this_invocation);
    println!("persist:    {}", target.should_persist_state);
    println!("reset:      {}", target.generated_from_reset);
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false)
                .with_level(true),
        )
        .init();

    let Command::Resolve(args) = cli.command;
    let format = args.format;
    let options = SessionCommandOptions::from(args);

    let (cancel_handle, cancel) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupt received, cancelling resolution");
            cancel_handle.cancel();
        }
    });

    let resolver = TargetResolver::new(Arc::new(TokioProcessGateway::new()), Environment::from_process());

    match resolver.resolve(&options, &cancel).await {
        Ok(target) => {
            match format {
                OutputFormat::Text => print_text(&target),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&target)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::debug!(kind = e.kind(), "Resolution failed");
            eprintln!("Error: {e}");
            Ok(ExitCode::from(u8::try_from(e.code()).unwrap_or(1)))
        }
    }
}

//! lanes - stdio tool dispatcher entry point.

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use lanes::cli::Cli;
use lanes::dispatcher::DispatcherContext;

fn setup_logging() {
    // Stdout is protocol-reserved; every diagnostic goes to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    if let Err(diagnostic) = cli.validate() {
        eprintln!("lanes: {diagnostic}");
        std::process::exit(1);
    }

    info!(worktree = %cli.worktree.display(), workflow_path = %cli.workflow_path.display(), "lanes dispatcher starting");

    let ctx = DispatcherContext::new(cli.worktree, cli.workflow_path, cli.repo_root);

    if let Err(e) = lanes::dispatcher::run(ctx).await.context("dispatcher loop failed") {
        eprintln!("lanes: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

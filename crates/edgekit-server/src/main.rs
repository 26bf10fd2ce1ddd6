use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgekit_core::{EdgekitConfig, FunctionStore};
use edgekit_runtime::{CommandController, NoopController, RuntimeController};
use edgekit_secrets::SecretStore;
use rmcp::ServiceExt;
use tracing_subscriber::{EnvFilter, fmt};

mod backend;
mod envelope;
mod handlers;
mod server;

use backend::HttpBackendClient;
use handlers::ToolHandlers;
use server::EdgekitServer;

#[derive(Parser)]
#[command(
    name = "edgekit",
    about = "edgekit MCP server -- deploy edge functions, manage their secrets, invoke them"
)]
struct Cli {
    /// Path to edgekit.toml (default: ./edgekit.toml, then ~/.config/edgekit/edgekit.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the MCP tools on stdio
    Serve,
    /// Validate configuration and report the store status
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they don't interfere with MCP stdio transport on stdout
    fmt()
        .with_env_filter(EnvFilter::from_env("EDGEKIT_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EdgekitConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Check => check(config).await,
    }
}

fn build_handlers(config: &EdgekitConfig) -> Result<ToolHandlers> {
    let root = config.store_root();
    root.resolve()
        .context("functions directory must be configured and exist")?;

    let runtime: Arc<dyn RuntimeController> = if config.runtime.restart_enabled {
        Arc::new(CommandController::new(
            config.runtime.restart_command.clone(),
            Duration::from_secs(config.runtime.restart_timeout_secs),
        )?)
    } else {
        tracing::warn!("Runtime restarts disabled; secret changes need a manual restart");
        Arc::new(NoopController)
    };

    let backend = HttpBackendClient::new(&config.backend)?;

    Ok(ToolHandlers::new(
        FunctionStore::new(root.clone(), &config.functions.source_ext),
        SecretStore::new(root, runtime),
        Arc::new(backend),
    ))
}

async fn serve(config: EdgekitConfig) -> Result<()> {
    let handlers = Arc::new(build_handlers(&config)?);

    tracing::info!(
        functions_dir = ?config.functions.dir,
        backend = %config.backend.url,
        restart_command = ?config.runtime.restart_command,
        "Starting edgekit MCP server"
    );

    let server = EdgekitServer::new(handlers)
        .serve(rmcp::transport::io::stdio())
        .await?;

    tracing::info!("edgekit serving on stdio");

    // Run until the agent disconnects
    server.waiting().await?;

    tracing::info!("edgekit shutting down");
    Ok(())
}

async fn check(config: EdgekitConfig) -> Result<()> {
    let root = config.store_root();
    let dir = root
        .resolve()
        .context("functions directory must be configured and exist")?;
    println!("functions dir:   {}", dir.display());

    let functions = FunctionStore::new(root.clone(), &config.functions.source_ext)
        .list()
        .await?;
    println!("functions:       {}", functions.len());
    for function in &functions {
        let marker = if function.has_index { "" } else { " (no source file)" };
        println!("  - {}{marker}", function.name);
    }

    let secrets = SecretStore::new(root, Arc::new(NoopController)).keys().await?;
    println!("secrets:         {}", secrets.join(", "));

    if config.runtime.restart_enabled {
        println!("restart command: {}", config.runtime.restart_command.join(" "));
    } else {
        println!("restart command: disabled");
    }
    println!("backend:         {}", config.backend.url);
    Ok(())
}

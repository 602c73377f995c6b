use anyhow::Result;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use svckit::{run, Plugin, RunOptions, ShutdownOptions};
use svckit_bootstrap::{AppConfig, AppConfigProvider, CliArgs};

use std::path::PathBuf;
use std::sync::Arc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Service host - mounts discoverable HTTP services on one server
#[derive(Parser)]
#[command(name = "svc-server")]
#[command(about = "Service host - mounts discoverable HTTP services on one server")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
}

/// Plugins hosted by this binary, in start order.
fn plugins() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(demo_service::DemoServicePlugin)]
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    svckit_bootstrap::init_logging(&logging_config, &config.server.home_path());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(&config),
    }
}

async fn run_server(config: AppConfig) -> Result<()> {
    let bind_addr = config.server.bind_addr()?;
    tracing::info!(%bind_addr, "svc-server starting");

    let mut opts = RunOptions::new(Arc::new(AppConfigProvider::new(config.clone())), bind_addr);
    opts.request_timeout = config.server.request_timeout();
    opts.body_limit = config.server.body_limit_bytes;
    opts.shutdown = ShutdownOptions::Signals;
    opts.plugins = plugins();

    run(opts).await
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    config.server.bind_addr()?;
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

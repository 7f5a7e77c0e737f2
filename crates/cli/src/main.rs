//! FireGPT CLI
//!
//! Main entry point for the firegpt command-line tool.
//! Serves the wildfire assistant over HTTP and exposes the same operations
//! as one-shot commands.

mod commands;
mod server;
mod state;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand, ModelsCommand, PlanCommand, ServeCommand};
use firegpt_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// FireGPT - offline wildfire response assistant
#[derive(Parser, Debug)]
#[command(name = "firegpt")]
#[command(about = "Offline wildfire response assistant with local RAG", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "FIREGPT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "FIREGPT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Start on the stub backend without loading a model
    #[arg(long, global = true, env = "FIREGPT_DUMMY")]
    dummy: bool,

    /// Directory scanned for GGUF model files
    #[arg(long, global = true, env = "FIREGPT_MODELS_DIR")]
    models_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(ServeCommand),

    /// Ask a wildfire question against the local corpus
    Ask(AskCommand),

    /// Generate an action plan for a fire location
    Plan(PlanCommand),

    /// List available model files
    Models(ModelsCommand),

    /// Add a PDF or image to the knowledge base
    Ingest(IngestCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Workspace and config file decide where configuration is read from
    let config = AppConfig::load_with(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.dummy,
        cli.models_dir,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("FireGPT starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Models dir: {:?}", config.models.dir);

    config.validate()?;
    config.ensure_firegpt_dir()?;

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Ask(_) => "ask",
        Commands::Plan(_) => "plan",
        Commands::Models(_) => "models",
        Commands::Ingest(_) => "ingest",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(config).await,
        Commands::Ask(cmd) => cmd.execute(config).await,
        Commands::Plan(cmd) => cmd.execute(config).await,
        Commands::Models(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

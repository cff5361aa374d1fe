mod commands;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "Declarative, resumable provisioning of a cloud application stack", long_about = None)]
struct Cli {
    /// Descriptor file (default: stack.kdl in the current directory)
    #[arg(short, long, global = true, env = "STACK_FILE")]
    file: Option<PathBuf>,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create every resource that is not created yet
    Provision {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the recorded state of every resource
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete deployed resources in reverse dependency order
    Teardown {
        /// Run without confirmation
        #[arg(short, long)]
        yes: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what provision (or teardown) would do
    Plan {
        /// Plan a teardown instead
        #[arg(long)]
        teardown: bool,
    },
    /// Validate the descriptor file
    Validate,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(utils::exit_code_for(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // version needs neither settings nor a descriptor file
    if matches!(cli.command, Commands::Version) {
        println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let settings = stackflow_config::Settings::load()?;
    let (path, set) = utils::load_descriptors(cli.file)?;
    let state_manager = utils::state_manager(&settings, &path, &set)?;

    match cli.command {
        Commands::Provision { json } => {
            commands::provision::handle(&set, &state_manager, &settings, json).await
        }
        Commands::Status { json } => commands::status::handle(&set, &state_manager, json).await,
        Commands::Teardown { yes, json } => {
            commands::teardown::handle(&set, &state_manager, &settings, yes, json).await
        }
        Commands::Plan { teardown } => {
            commands::plan::handle(&set, &state_manager, teardown).await
        }
        Commands::Validate => commands::validate::handle(&path, &set),
        Commands::Version => Ok(ExitCode::SUCCESS),
    }
}

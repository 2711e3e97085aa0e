//! trainwatch CLI - Command-line interface
//!
//! This binary provides a command-line interface to the trainwatch library.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::stop::StopArgs;
use commands::watch::WatchArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "trainwatch")]
#[command(version = trainwatch::VERSION)]
#[command(about = "Monitor remote model training jobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor a training job until it completes, fails or is interrupted
    Watch {
        /// Job identifier returned by the training server
        job_id: String,

        /// Training server URL (overrides [server] url in config.ini)
        #[arg(long)]
        server: Option<String>,

        /// Enable debug logging (also mirrored to stdout)
        #[arg(long)]
        debug: bool,
    },

    /// Ask the training server to stop a job
    Stop {
        /// Job identifier returned by the training server
        job_id: String,

        /// Training server URL (overrides [server] url in config.ini)
        #[arg(long)]
        server: Option<String>,

        /// Enable debug logging (also mirrored to stdout)
        #[arg(long)]
        debug: bool,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Watch {
            job_id,
            server,
            debug,
        } => {
            commands::watch::run(WatchArgs {
                job_id,
                server,
                debug,
            })
            .await
        }
        Commands::Stop {
            job_id,
            server,
            debug,
        } => {
            commands::stop::run(StopArgs {
                job_id,
                server,
                debug,
            })
            .await
        }
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}

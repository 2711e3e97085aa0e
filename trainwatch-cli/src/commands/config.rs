//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init` for inspecting
//! and creating the configuration file.

use clap::Subcommand;
use trainwatch::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration (file values over defaults)
    Show,

    /// Write a commented configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init { force } => run_init(force),
    }
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

/// Print the effective configuration.
fn run_show() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load_from(&path)?;

    if !path.exists() {
        println!("; {} not found, showing defaults", path.display());
        println!();
    }
    print!("{}", config.to_ini_string());
    Ok(())
}

/// Create the configuration file.
fn run_init(force: bool) -> Result<(), CliError> {
    let path = config_file_path();

    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }

    ConfigFile::default().save_to(&path)?;
    println!("Created {}", path.display());
    Ok(())
}

//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, show, init)
//! - [`stop`] - One-shot remote stop of a job
//! - [`watch`] - Monitor a job until it finishes

pub mod config;
pub mod stop;
pub mod watch;

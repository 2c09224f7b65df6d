// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Manila Provisioner CLI
//!
//! The `manilactl` binary reconciles node access to OpenStack Manila shares.
//!
//! ## Commands
//!
//! - `manilactl access ensure|context` - Ensure access rules, print volume context
//! - `manilactl config show|validate|generate` - Configuration management
//!
//! Ctrl-C cancels an in-flight reconciliation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use manila_core::domain::config::{LogFormat, ProvisionerConfigManifest, CONFIG_PATH_ENV};

mod commands;

use commands::{AccessCommand, ConfigCommand};

/// Manila Provisioner - Reconcile share access for CephFS and NFS volumes
#[derive(Parser)]
#[command(name = "manilactl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to spec.logging.level
    #[arg(long, global = true, env = "MANILA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format; defaults to spec.logging.format
    #[arg(long, global = true, value_parser = ["compact", "json"])]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Share access operations
    #[command(name = "access")]
    Access {
        #[command(subcommand)]
        command: AccessCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the config file unless given on the command line
    let manifest = ProvisionerConfigManifest::load_or_default(cli.config.clone());
    let logging = manifest
        .as_ref()
        .map(|m| m.spec.logging.clone())
        .unwrap_or_default();

    let level = cli.log_level.unwrap_or(logging.level);
    let format = match cli.log_format.as_deref() {
        Some("json") => LogFormat::Json,
        Some(_) => LogFormat::Compact,
        None => logging.format,
    };
    init_logging(&level, format)?;

    match cli.command {
        Some(Commands::Access { command }) => {
            let manifest = manifest.context("Failed to load configuration")?;
            commands::access::handle_command(command, manifest).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}

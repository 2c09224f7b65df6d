// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use manila_core::domain::config::{ProvisionerConfigManifest, CONFIG_PATH_ENV};

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./manila-provisioner.yaml)
        #[arg(short, long, default_value = "./manila-provisioner.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ProvisionerConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./manila-provisioner.yaml");
        println!("  4. ~/.manila-provisioner/config.yaml");
        println!("  5. /etc/manila-provisioner/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let manila = &config.spec.manila;
    println!("{}", "Manila:".bold());
    if manila.endpoint.is_empty() {
        println!("  Endpoint: {}", "(not set)".dimmed());
    } else {
        println!("  Endpoint: {}", manila.endpoint);
    }
    println!("  Token: {}", describe_token(manila.token.as_deref()));
    println!("  Microversion: {}", manila.microversion);
    println!("  Request timeout: {:?}", manila.timeout);
    println!();

    let wait = &config.spec.access_wait;
    println!("{}", "Access key wait:".bold());
    println!("  Initial delay: {:?}", wait.initial_delay);
    println!("  Factor: {}", wait.factor);
    println!("  Attempts: {}", wait.steps);
    println!("  Max total wait: {:.1}s", wait.max_total_delay().as_secs_f64());
    println!();

    println!("{}", "Logging:".bold());
    println!("  Level: {}", config.spec.logging.level);
    println!("  Format: {:?}", config.spec.logging.format);

    Ok(())
}

/// Describe where the token comes from without printing it
fn describe_token(token: Option<&str>) -> String {
    match token {
        None => "(not set)".to_string(),
        Some(t) => match t.strip_prefix("env:") {
            Some(var) => format!("from ${}", var),
            None => "(literal, hidden)".to_string(),
        },
    }
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ProvisionerConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

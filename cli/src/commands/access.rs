// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Share access commands
//!
//! Commands: ensure, context

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use manila_core::application::{AccessService, ProvisionedAccess, StandardAccessService};
use manila_core::domain::adapter::AdapterError;
use manila_core::domain::config::ProvisionerConfigManifest;
use manila_core::domain::events::AccessEvent;
use manila_core::domain::options::ShareOptions;
use manila_core::domain::share::ShareId;
use manila_core::infrastructure::event_bus::{EventBus, EventBusError, EventReceiver};
use manila_core::infrastructure::manila::{create_share_client, ShareBackend};

const REDACTED: &str = "<redacted>";

#[derive(Subcommand)]
pub enum AccessCommand {
    /// Ensure a usable access rule exists for this node
    Ensure {
        #[command(flatten)]
        share: ShareArgs,
    },

    /// Ensure access and print the volume context and secrets as JSON
    Context {
        #[command(flatten)]
        share: ShareArgs,

        /// Print secret values instead of redacting them
        #[arg(long)]
        show_secrets: bool,
    },
}

#[derive(Args)]
pub struct ShareArgs {
    /// Manila share ID
    #[arg(long, value_name = "ID")]
    share_id: String,

    /// Ceph client ID to grant access to (default: share name)
    #[arg(long, value_name = "ID")]
    client_id: Option<String>,

    /// Share option, e.g. cephfs-mounter=kernel (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    params: Vec<(String, String)>,
}

impl ShareArgs {
    fn options(&self) -> Result<ShareOptions> {
        let params: HashMap<String, String> = self.params.iter().cloned().collect();
        let mut options = ShareOptions::from_parameters(&params)?;
        if let Some(client_id) = &self.client_id {
            options = options.with_cephfs_client_id(client_id.clone());
        }
        Ok(options)
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

pub async fn handle_command(command: AccessCommand, manifest: ProvisionerConfigManifest) -> Result<()> {
    manifest.validate().context("Configuration validation failed")?;

    let manila = &manifest.spec.manila;
    let client = create_share_client(ShareBackend::Manila {
        endpoint: manila.endpoint.clone(),
        token: manila.resolve_token()?,
        microversion: manila.microversion.clone(),
        timeout: manila.timeout,
    })?;

    let event_bus = Arc::new(EventBus::with_default_capacity());
    let service = StandardAccessService::with_access_key_wait(
        client,
        event_bus.clone(),
        manifest.spec.access_wait,
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling");
            ctrl_c.cancel();
        }
    });

    let result = match command {
        AccessCommand::Ensure { share } => ensure(&service, &event_bus, &share, &cancel).await,
        AccessCommand::Context { share, show_secrets } => {
            context(&service, &event_bus, &share, show_secrets, &cancel).await
        }
    };

    if let Err(e) = &result {
        if e.downcast_ref::<AdapterError>().is_some_and(AdapterError::is_cancelled) {
            eprintln!("{}", "Cancelled".yellow());
            std::process::exit(130);
        }
    }

    result
}

async fn ensure(
    service: &StandardAccessService,
    event_bus: &EventBus,
    args: &ShareArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let share_id = ShareId::new(args.share_id.as_str());
    let options = args.options()?;

    let done = CancellationToken::new();
    let progress = tokio::spawn(print_progress(
        event_bus.subscribe_share(share_id.clone()),
        done.clone(),
    ));
    let result = service.ensure_access(&share_id, &options, cancel).await;
    done.cancel();
    let _ = progress.await;

    let (share, rule) = result?;

    println!("{}", format!("✓ Access ready on share {} ({})", share.name, share.id).green());
    println!("  Rule ID: {}", rule.id);
    println!("  Access: {:?} {} ({:?})", rule.access_type, rule.access_to, rule.access_level);
    if rule.has_access_key() {
        println!("  Access key: {}", "present".green());
    }

    Ok(())
}

async fn context(
    service: &StandardAccessService,
    event_bus: &EventBus,
    args: &ShareArgs,
    show_secrets: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let share_id = ShareId::new(args.share_id.as_str());
    let options = args.options()?;

    let done = CancellationToken::new();
    let progress = tokio::spawn(print_progress(
        event_bus.subscribe_share(share_id.clone()),
        done.clone(),
    ));
    let result = service.provision(&share_id, &options, cancel).await;
    done.cancel();
    let _ = progress.await;

    let mut provisioned = result?;
    if !show_secrets {
        redact_secrets(&mut provisioned);
    }

    println!("{}", serde_json::to_string_pretty(&provisioned)?);
    Ok(())
}

fn redact_secrets(provisioned: &mut ProvisionedAccess) {
    provisioned.access_rule.access_key = REDACTED.to_string();
    for value in provisioned
        .node_stage_secret
        .values_mut()
        .chain(provisioned.node_publish_secret.values_mut())
    {
        *value = REDACTED.to_string();
    }
}

/// Print access events until `done` fires, then flush what is still queued
///
/// Returns the number of events printed.
async fn print_progress(mut events: EventReceiver, done: CancellationToken) -> usize {
    let mut printed = 0;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    printed += 1;
                }
                Err(EventBusError::Lagged(n)) => debug!("Skipped {} progress events", n),
                Err(_) => return printed,
            },
            _ = done.cancelled() => break,
        }
    }

    loop {
        match events.try_recv() {
            Ok(event) => {
                print_event(&event);
                printed += 1;
            }
            Err(EventBusError::Lagged(n)) => debug!("Skipped {} progress events", n),
            Err(_) => return printed,
        }
    }
}

fn print_event(event: &AccessEvent) {
    match event {
        AccessEvent::AccessRequested { share_id, share_proto, .. } => {
            eprintln!("{} {} ({:?})", "→ Reconciling access on share".dimmed(), share_id, share_proto);
        }
        AccessEvent::AccessProvisioned { access_to, access_rule_id, .. } => {
            eprintln!("{} {} ({})", "→ Access rule ready for".dimmed(), access_to, access_rule_id);
        }
        AccessEvent::AccessProvisioningFailed { reason, .. } => {
            eprintln!("{} {}", "✗".red(), reason);
        }
    }
}

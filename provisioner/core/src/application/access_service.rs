// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Access Service Application Service
//!
//! Orchestrates share access reconciliation coordinating:
//! - Domain layer: Share, ShareOptions, ShareAdapter trait
//! - Infrastructure layer: ShareAccessClient implementations, share adapters
//! - Event bus: Publishing AccessEvents for observability

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::adapter::{AdapterError, GrantAccessArgs, SecretArgs, ShareAdapter, VolumeContextArgs};
use crate::domain::backoff::Backoff;
use crate::domain::events::AccessEvent;
use crate::domain::options::ShareOptions;
use crate::domain::share::{AccessRule, Share, ShareId};
use crate::domain::share_client::ShareAccessClient;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::share_adapters::create_share_adapter;
use crate::infrastructure::wait::cancellable;

/// Everything a node plugin needs to mount a share
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedAccess {
    pub share: Share,
    pub access_rule: AccessRule,
    pub volume_context: HashMap<String, String>,
    pub node_stage_secret: HashMap<String, String>,
    pub node_publish_secret: HashMap<String, String>,
}

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait AccessService: Send + Sync {
    /// Make sure the share carries a usable access rule for this node
    async fn ensure_access(
        &self,
        share_id: &ShareId,
        options: &ShareOptions,
        cancel: &CancellationToken,
    ) -> Result<(Share, AccessRule)>;

    /// Ensure access, then assemble the volume context and secrets
    async fn provision(
        &self,
        share_id: &ShareId,
        options: &ShareOptions,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedAccess>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardAccessService {
    client: Arc<dyn ShareAccessClient>,
    event_bus: Arc<EventBus>,
    access_key_wait: Backoff,
}

impl StandardAccessService {
    pub fn new(client: Arc<dyn ShareAccessClient>, event_bus: Arc<EventBus>) -> Self {
        Self::with_access_key_wait(client, event_bus, Backoff::default())
    }

    pub fn with_access_key_wait(
        client: Arc<dyn ShareAccessClient>,
        event_bus: Arc<EventBus>,
        access_key_wait: Backoff,
    ) -> Self {
        Self {
            client,
            event_bus,
            access_key_wait,
        }
    }

    async fn fetch_share(&self, share_id: &ShareId, cancel: &CancellationToken) -> Result<Share> {
        let share = cancellable(cancel, self.client.get_share(share_id))
            .await
            .map_err(|_| AdapterError::Cancelled)?
            .with_context(|| format!("Failed to fetch share {}", share_id))?;
        Ok(share)
    }

    fn adapter_for(&self, share: &Share) -> Result<Arc<dyn ShareAdapter>> {
        create_share_adapter(share.share_proto, self.access_key_wait).ok_or_else(|| {
            anyhow::anyhow!(
                "Share {} uses an unsupported protocol {:?}",
                share.id,
                share.share_proto
            )
        })
    }

    async fn reconcile(
        &self,
        share_id: &ShareId,
        options: &ShareOptions,
        cancel: &CancellationToken,
    ) -> Result<(Share, Arc<dyn ShareAdapter>, AccessRule)> {
        let share = self.fetch_share(share_id, cancel).await?;
        let adapter = self.adapter_for(&share)?;

        self.event_bus.publish_access_event(AccessEvent::AccessRequested {
            share_id: share.id.clone(),
            share_proto: share.share_proto,
            requested_at: Utc::now(),
        });

        let args = GrantAccessArgs {
            share: &share,
            options,
            client: self.client.as_ref(),
        };

        let access_rule = adapter
            .get_or_grant_access(args, cancel)
            .await
            .map_err(|e| {
                self.publish_failure(&share.id, &e.to_string());
                e
            })
            .with_context(|| format!("Failed to ensure access to share {}", share.id))?;

        self.event_bus.publish_access_event(AccessEvent::AccessProvisioned {
            share_id: share.id.clone(),
            access_rule_id: access_rule.id.clone(),
            access_type: access_rule.access_type,
            access_to: access_rule.access_to.clone(),
            provisioned_at: Utc::now(),
        });

        Ok((share, adapter, access_rule))
    }

    fn publish_failure(&self, share_id: &ShareId, reason: &str) {
        warn!(share_id = %share_id, reason, "Access provisioning failed");
        self.event_bus.publish_access_event(AccessEvent::AccessProvisioningFailed {
            share_id: share_id.clone(),
            reason: reason.to_string(),
            failed_at: Utc::now(),
        });
    }
}

#[async_trait]
impl AccessService for StandardAccessService {
    async fn ensure_access(
        &self,
        share_id: &ShareId,
        options: &ShareOptions,
        cancel: &CancellationToken,
    ) -> Result<(Share, AccessRule)> {
        info!(share_id = %share_id, "Ensuring share access");
        let (share, _, access_rule) = self.reconcile(share_id, options, cancel).await?;
        Ok((share, access_rule))
    }

    async fn provision(
        &self,
        share_id: &ShareId,
        options: &ShareOptions,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedAccess> {
        info!(share_id = %share_id, "Provisioning share access");
        let (share, adapter, access_rule) = self.reconcile(share_id, options, cancel).await?;

        let locations = match cancellable(cancel, self.client.get_export_locations(&share.id)).await {
            Ok(Ok(locations)) => locations,
            Ok(Err(e)) => {
                self.publish_failure(&share.id, &e.to_string());
                return Err(e)
                    .with_context(|| format!("Failed to fetch export locations of share {}", share.id));
            }
            Err(_) => {
                self.publish_failure(&share.id, &AdapterError::Cancelled.to_string());
                return Err(AdapterError::Cancelled.into());
            }
        };
        debug!(share_id = %share.id, count = locations.len(), "Fetched export locations");

        let built = adapter
            .build_volume_context(VolumeContextArgs {
                locations: &locations,
                options,
            })
            .and_then(|volume_context| {
                let secret_args = SecretArgs {
                    access_rule: &access_rule,
                };
                Ok((
                    volume_context,
                    adapter.build_node_stage_secret(secret_args)?,
                    adapter.build_node_publish_secret(secret_args)?,
                ))
            });

        let (volume_context, node_stage_secret, node_publish_secret) = built
            .map_err(|e| {
                self.publish_failure(&share.id, &e.to_string());
                e
            })
            .with_context(|| format!("Failed to build volume context for share {}", share.id))?;

        Ok(ProvisionedAccess {
            share,
            access_rule,
            volume_context,
            node_stage_secret,
            node_publish_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::share::{AccessLevel, AccessType, ExportLocation, ShareProtocol};
    use crate::domain::share_client::ShareClientError;
    use crate::infrastructure::manila::InMemoryShareClient;
    use std::time::Duration;

    fn share(id: &str, proto: ShareProtocol) -> Share {
        Share {
            id: ShareId::new(id),
            name: format!("{}-name", id),
            share_proto: proto,
            size: 1,
            status: "available".to_string(),
        }
    }

    fn location(path: &str) -> ExportLocation {
        ExportLocation {
            id: "el-1".to_string(),
            path: path.to_string(),
            share_instance_id: String::new(),
            is_admin_only: false,
            preferred: false,
        }
    }

    fn service(client: Arc<InMemoryShareClient>, bus: Arc<EventBus>) -> StandardAccessService {
        StandardAccessService::with_access_key_wait(client, bus, Backoff::new(Duration::from_millis(10), 1.0, 3))
    }

    #[tokio::test]
    async fn test_provision_cephfs_share() {
        let client = Arc::new(InMemoryShareClient::new());
        client.insert_share(
            share("s1", ShareProtocol::CephFs),
            vec![location("10.0.0.1:6789,10.0.0.2:6789:/volumes/_nogroup/abc")],
        );
        let bus = Arc::new(EventBus::with_default_capacity());
        let mut events = bus.subscribe();

        let provisioned = service(client.clone(), bus)
            .provision(&ShareId::new("s1"), &ShareOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(provisioned.access_rule.access_to, "s1-name");
        assert_eq!(provisioned.volume_context["monitors"], "10.0.0.1:6789,10.0.0.2:6789");
        assert_eq!(provisioned.volume_context["rootPath"], "/volumes/_nogroup/abc");
        assert_eq!(provisioned.node_stage_secret["userID"], "s1-name");
        assert_eq!(provisioned.node_stage_secret["userKey"], provisioned.access_rule.access_key);
        assert!(provisioned.node_publish_secret.is_empty());

        assert!(matches!(events.try_recv().unwrap(), AccessEvent::AccessRequested { .. }));
        assert!(matches!(events.try_recv().unwrap(), AccessEvent::AccessProvisioned { .. }));
    }

    #[tokio::test]
    async fn test_ensure_access_reuses_rule() {
        let client = Arc::new(InMemoryShareClient::new());
        client.insert_share(share("s1", ShareProtocol::CephFs), vec![]);
        client.insert_access_rule(&ShareId::new("s1"), "node-a", AccessType::Cephx, AccessLevel::Rw, "AQkey==");
        let bus = Arc::new(EventBus::with_default_capacity());

        let options = ShareOptions::default().with_cephfs_client_id("node-a");
        let (_, rule) = service(client.clone(), bus)
            .ensure_access(&ShareId::new("s1"), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(rule.access_key, "AQkey==");
        assert_eq!(client.grant_calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_protocol() {
        let client = Arc::new(InMemoryShareClient::new());
        client.insert_share(share("s1", ShareProtocol::Unsupported), vec![]);
        let bus = Arc::new(EventBus::with_default_capacity());

        let err = service(client.clone(), bus)
            .ensure_access(&ShareId::new("s1"), &ShareOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("unsupported protocol"));
        assert_eq!(client.list_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_publishes_event() {
        let client = Arc::new(InMemoryShareClient::new());
        client.insert_share(share("s1", ShareProtocol::CephFs), vec![]);
        client.disable_access_key_assignment();
        let bus = Arc::new(EventBus::with_default_capacity());
        let mut events = bus.subscribe_share(ShareId::new("s1"));

        let err = service(client.clone(), bus)
            .ensure_access(&ShareId::new("s1"), &ShareOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        let adapter_err = err.downcast_ref::<AdapterError>().unwrap();
        assert!(adapter_err.is_timeout());

        assert!(matches!(events.try_recv().unwrap(), AccessEvent::AccessRequested { .. }));
        assert!(matches!(
            events.try_recv().unwrap(),
            AccessEvent::AccessProvisioningFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_share() {
        let client = Arc::new(InMemoryShareClient::new());
        let bus = Arc::new(EventBus::with_default_capacity());

        let err = service(client, bus)
            .provision(&ShareId::new("missing"), &ShareOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to fetch share missing"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let client = Arc::new(InMemoryShareClient::new());
        client.insert_share(share("s1", ShareProtocol::CephFs), vec![]);
        let bus = Arc::new(EventBus::with_default_capacity());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service(client, bus)
            .ensure_access(&ShareId::new("s1"), &ShareOptions::default(), &cancel)
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<AdapterError>().unwrap().is_cancelled());
    }

    #[tokio::test]
    async fn test_export_location_fetch_failure_publishes_event() {
        let client = Arc::new(InMemoryShareClient::new());
        client.insert_share(share("s1", ShareProtocol::Nfs), vec![location("10.0.0.5:/exports/s1")]);
        client.fail_next_export_locations(ShareClientError::Http {
            status: 503,
            message: "unavailable".to_string(),
        });
        let bus = Arc::new(EventBus::with_default_capacity());
        let mut events = bus.subscribe_share(ShareId::new("s1"));

        let err = service(client, bus)
            .provision(&ShareId::new("s1"), &ShareOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to fetch export locations of share s1"));
        assert!(matches!(events.try_recv().unwrap(), AccessEvent::AccessRequested { .. }));
        assert!(matches!(events.try_recv().unwrap(), AccessEvent::AccessProvisioned { .. }));
        match events.try_recv().unwrap() {
            AccessEvent::AccessProvisioningFailed { reason, .. } => assert!(reason.contains("503")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provision_without_export_location_fails() {
        let client = Arc::new(InMemoryShareClient::new());
        client.insert_share(share("s1", ShareProtocol::Nfs), vec![]);
        let bus = Arc::new(EventBus::with_default_capacity());

        let err = service(client, bus)
            .provision(&ShareId::new("s1"), &ShareOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AdapterError>(),
            Some(AdapterError::ExportLocation(_))
        ));
    }
}

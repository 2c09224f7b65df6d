// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CephFS Share Adapter
//!
//! Grants a read-write cephx access rule to a Ceph client ID and waits for
//! Manila to assign the cephx key, which happens asynchronously after the
//! rule is created.
//!
//! # Reconciliation
//!
//! 1. List the share's access rules (a missing list counts as empty)
//! 2. Reuse the first rule matching (client ID, cephx, rw), else grant one
//! 3. Return at once if the rule already carries a key
//! 4. Otherwise poll the access list with exponential backoff until the
//!    key shows up, the rule disappears or the attempts run out
//!
//! Listing and granting happen exactly once per call. Two concurrent calls
//! for the same client ID may both grant; Manila decides what happens to the
//! duplicate.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::adapter::{AdapterError, GrantAccessArgs, SecretArgs, ShareAdapter, VolumeContextArgs};
use crate::domain::backoff::Backoff;
use crate::domain::export_location::{any_export_location, find_export_location, split_export_location_path};
use crate::domain::share::{AccessLevel, AccessRule, AccessType, GrantAccessOpts, ShareProtocol};
use crate::infrastructure::wait::{cancellable, exponential_backoff, WaitError};

const ACCESS_TYPE: AccessType = AccessType::Cephx;
const ACCESS_LEVEL: AccessLevel = AccessLevel::Rw;

pub struct Cephfs {
    /// Policy for waiting on the cephx key
    access_key_wait: Backoff,
}

impl Cephfs {
    pub fn new() -> Self {
        Self::with_backoff(Backoff::default())
    }

    pub fn with_backoff(access_key_wait: Backoff) -> Self {
        Self { access_key_wait }
    }

    pub fn access_key_wait(&self) -> Backoff {
        self.access_key_wait
    }

    /// Principal of the access rule: the configured client ID, else the share name
    pub fn resolve_access_to<'a>(args: &GrantAccessArgs<'a>) -> &'a str {
        if args.options.cephfs_client_id.is_empty() {
            &args.share.name
        } else {
            &args.options.cephfs_client_id
        }
    }

    async fn wait_for_access_key(
        &self,
        args: GrantAccessArgs<'_>,
        access_to: &str,
        cancel: &CancellationToken,
    ) -> Result<AccessRule, AdapterError> {
        let client = args.client;
        let share_id = &args.share.id;

        debug!(
            share_id = %share_id,
            access_to,
            max_attempts = self.access_key_wait.steps,
            "Waiting for cephx key to be assigned"
        );

        let result = exponential_backoff(self.access_key_wait, cancel, |attempt| async move {
            let rights = client
                .get_access_rights(share_id)
                .await
                .map_err(AdapterError::PollAccessRights)?;

            // The rule exists by now, so the principal alone identifies it.
            let rule = rights
                .into_iter()
                .find(|r| r.access_to == access_to)
                .ok_or_else(|| AdapterError::AccessRuleVanished {
                    share_id: share_id.clone(),
                    access_to: access_to.to_string(),
                })?;

            if rule.has_access_key() {
                Ok(Some(rule))
            } else {
                debug!(share_id = %share_id, attempt, "cephx key not assigned yet");
                Ok(None)
            }
        })
        .await;

        match result {
            Ok(rule) => {
                info!(share_id = %share_id, access_to, "cephx key assigned");
                Ok(rule)
            }
            Err(WaitError::Condition(e)) => Err(e),
            Err(WaitError::Cancelled) => Err(AdapterError::Cancelled),
            Err(WaitError::Timeout { attempts }) => {
                warn!(
                    share_id = %share_id,
                    access_to,
                    attempts,
                    "Gave up waiting for cephx key"
                );
                Err(AdapterError::WaitTimeout { attempts })
            }
        }
    }
}

impl Default for Cephfs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShareAdapter for Cephfs {
    fn protocol(&self) -> ShareProtocol {
        ShareProtocol::CephFs
    }

    async fn get_or_grant_access(
        &self,
        args: GrantAccessArgs<'_>,
        cancel: &CancellationToken,
    ) -> Result<AccessRule, AdapterError> {
        let share = args.share;
        let access_to = Self::resolve_access_to(&args);

        let listed = cancellable(cancel, args.client.get_access_rights(&share.id))
            .await
            .map_err(|_| AdapterError::Cancelled)?;

        let rights = match listed {
            Ok(rights) => rights,
            Err(e) if e.is_not_found() => {
                debug!(share_id = %share.id, "No access list for share yet");
                Vec::new()
            }
            Err(e) => return Err(AdapterError::ListAccessRights(e)),
        };

        let existing = rights
            .into_iter()
            .find(|r| r.matches(access_to, ACCESS_TYPE, ACCESS_LEVEL));

        let access_rule = match existing {
            Some(rule) => {
                debug!("cephx access right for share {} already exists", share.name);
                rule
            }
            None => {
                let opts = GrantAccessOpts {
                    access_type: ACCESS_TYPE,
                    access_to: access_to.to_string(),
                    access_level: ACCESS_LEVEL,
                };

                let rule = cancellable(cancel, args.client.grant_access(&share.id, opts))
                    .await
                    .map_err(|_| AdapterError::Cancelled)?
                    .map_err(AdapterError::GrantAccess)?;

                info!(
                    share_id = %share.id,
                    access_rule_id = %rule.id,
                    access_to,
                    "Granted cephx access"
                );
                rule
            }
        };

        if access_rule.has_access_key() {
            return Ok(access_rule);
        }

        self.wait_for_access_key(args, access_to, cancel).await
    }

    fn build_volume_context(&self, args: VolumeContextArgs<'_>) -> Result<HashMap<String, String>, AdapterError> {
        let idx = find_export_location(args.locations, any_export_location)
            .map_err(AdapterError::ExportLocation)?;

        let (monitors, root_path) = split_export_location_path(&args.locations[idx].path)
            .map_err(AdapterError::InvalidExportLocation)?;

        let mut volume_context = HashMap::from([
            ("monitors".to_string(), monitors.to_string()),
            ("rootPath".to_string(), root_path.to_string()),
            ("mounter".to_string(), args.options.cephfs_mounter.as_str().to_string()),
            ("provisionVolume".to_string(), "false".to_string()),
        ]);

        if !args.options.cephfs_kernel_mount_options.is_empty() {
            volume_context.insert(
                "kernelMountOptions".to_string(),
                args.options.cephfs_kernel_mount_options.clone(),
            );
        }

        if !args.options.cephfs_fuse_mount_options.is_empty() {
            volume_context.insert(
                "fuseMountOptions".to_string(),
                args.options.cephfs_fuse_mount_options.clone(),
            );
        }

        Ok(volume_context)
    }

    fn build_node_stage_secret(&self, args: SecretArgs<'_>) -> Result<HashMap<String, String>, AdapterError> {
        Ok(HashMap::from([
            ("userID".to_string(), args.access_rule.access_to.clone()),
            ("userKey".to_string(), args.access_rule.access_key.clone()),
        ]))
    }

    fn build_node_publish_secret(&self, _args: SecretArgs<'_>) -> Result<HashMap<String, String>, AdapterError> {
        Ok(HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::options::{CephfsMounter, ShareOptions};
    use crate::domain::share::{ExportLocation, Share, ShareId};
    use crate::domain::share_client::ShareClientError;
    use crate::infrastructure::manila::InMemoryShareClient;

    fn share() -> Share {
        Share {
            id: ShareId::new("s1"),
            name: "myshare".to_string(),
            share_proto: ShareProtocol::CephFs,
            size: 1,
            status: "available".to_string(),
        }
    }

    fn export_location(path: &str) -> ExportLocation {
        ExportLocation {
            id: "el-1".to_string(),
            path: path.to_string(),
            share_instance_id: String::new(),
            is_admin_only: false,
            preferred: true,
        }
    }

    #[tokio::test]
    async fn test_existing_ready_rule_is_returned_without_grant() {
        let client = InMemoryShareClient::new();
        let share = share();
        client.insert_share(share.clone(), vec![]);
        client.insert_access_rule(&share.id, "myshare", AccessType::Cephx, AccessLevel::Rw, "key==");

        let options = ShareOptions::default();
        let cancel = CancellationToken::new();
        let rule = Cephfs::new()
            .get_or_grant_access(
                GrantAccessArgs { share: &share, options: &options, client: &client },
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(rule.access_key, "key==");
        assert_eq!(client.grant_calls(), 0);
        assert_eq!(client.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_rule_with_other_level_is_not_reused() {
        let client = InMemoryShareClient::new();
        let share = share();
        client.insert_share(share.clone(), vec![]);
        client.insert_access_rule(&share.id, "myshare", AccessType::Cephx, AccessLevel::Ro, "ro-key");
        client.set_access_key_delay(0);

        let options = ShareOptions::default();
        let cancel = CancellationToken::new();
        let rule = Cephfs::new()
            .get_or_grant_access(
                GrantAccessArgs { share: &share, options: &options, client: &client },
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(client.grant_calls(), 1);
        assert_eq!(rule.access_level, AccessLevel::Rw);
        assert!(rule.has_access_key());
    }

    #[tokio::test]
    async fn test_list_failure_aborts_before_grant() {
        let client = InMemoryShareClient::new();
        let share = share();
        client.insert_share(share.clone(), vec![]);
        client.fail_next_list(ShareClientError::Http {
            status: 500,
            message: "internal".to_string(),
        });

        let options = ShareOptions::default();
        let cancel = CancellationToken::new();
        let err = Cephfs::new()
            .get_or_grant_access(
                GrantAccessArgs { share: &share, options: &options, client: &client },
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::ListAccessRights(ShareClientError::Http { status: 500, .. })));
        assert!(err.to_string().starts_with("failed to list access rights"));
        assert_eq!(client.grant_calls(), 0);
    }

    #[tokio::test]
    async fn test_grant_failure_is_surfaced_verbatim() {
        let client = InMemoryShareClient::new();
        let share = share();
        client.insert_share(share.clone(), vec![]);
        client.fail_next_grant(ShareClientError::Unauthorized("quota".to_string()));

        let options = ShareOptions::default();
        let cancel = CancellationToken::new();
        let err = Cephfs::new()
            .get_or_grant_access(
                GrantAccessArgs { share: &share, options: &options, client: &client },
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::GrantAccess(ShareClientError::Unauthorized(_))));
        assert_eq!(err.to_string(), "Unauthorized: quota");
    }

    #[test]
    fn test_volume_context() {
        let options = ShareOptions {
            cephfs_mounter: CephfsMounter::Kernel,
            cephfs_kernel_mount_options: "noatime".to_string(),
            ..ShareOptions::default()
        };
        let locations = vec![export_location("10.0.0.1:6789,10.0.0.2:6789:/volumes/_nogroup/abc")];

        let ctx = Cephfs::new()
            .build_volume_context(VolumeContextArgs { locations: &locations, options: &options })
            .unwrap();

        assert_eq!(ctx["monitors"], "10.0.0.1:6789,10.0.0.2:6789");
        assert_eq!(ctx["rootPath"], "/volumes/_nogroup/abc");
        assert_eq!(ctx["mounter"], "kernel");
        assert_eq!(ctx["provisionVolume"], "false");
        assert_eq!(ctx["kernelMountOptions"], "noatime");
        assert!(!ctx.contains_key("fuseMountOptions"));
    }

    #[test]
    fn test_volume_context_errors() {
        let options = ShareOptions::default();
        let adapter = Cephfs::new();

        let err = adapter
            .build_volume_context(VolumeContextArgs { locations: &[], options: &options })
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to choose an export location"));

        let bad = vec![export_location("/no-monitors")];
        let err = adapter
            .build_volume_context(VolumeContextArgs { locations: &bad, options: &options })
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidExportLocation(_)));
    }

    #[test]
    fn test_secrets() {
        let rule = AccessRule {
            id: "r1".to_string(),
            share_id: "s1".to_string(),
            access_type: AccessType::Cephx,
            access_to: "alice".to_string(),
            access_level: AccessLevel::Rw,
            access_key: "AQB==".to_string(),
            state: "active".to_string(),
        };
        let adapter = Cephfs::new();

        let stage = adapter.build_node_stage_secret(SecretArgs { access_rule: &rule }).unwrap();
        assert_eq!(stage.len(), 2);
        assert_eq!(stage["userID"], "alice");
        assert_eq!(stage["userKey"], "AQB==");

        let publish = adapter.build_node_publish_secret(SecretArgs { access_rule: &rule }).unwrap();
        assert!(publish.is_empty());
    }
}

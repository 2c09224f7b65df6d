// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! NFS Share Adapter
//!
//! Grants read-write IP access to the configured client address or CIDR.
//! IP rules carry no credential material, so there is nothing to wait for.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::adapter::{AdapterError, GrantAccessArgs, SecretArgs, ShareAdapter, VolumeContextArgs};
use crate::domain::export_location::{any_export_location, find_export_location, split_export_location_path};
use crate::domain::share::{AccessLevel, AccessRule, AccessType, GrantAccessOpts, ShareProtocol};
use crate::infrastructure::wait::cancellable;

const ACCESS_TYPE: AccessType = AccessType::Ip;
const ACCESS_LEVEL: AccessLevel = AccessLevel::Rw;

#[derive(Debug, Default)]
pub struct Nfs;

#[async_trait]
impl ShareAdapter for Nfs {
    fn protocol(&self) -> ShareProtocol {
        ShareProtocol::Nfs
    }

    async fn get_or_grant_access(
        &self,
        args: GrantAccessArgs<'_>,
        cancel: &CancellationToken,
    ) -> Result<AccessRule, AdapterError> {
        let share_id = &args.share.id;
        let access_to = args.options.nfs_share_client.as_str();

        let listed = cancellable(cancel, args.client.get_access_rights(share_id))
            .await
            .map_err(|_| AdapterError::Cancelled)?;

        let rights = match listed {
            Ok(rights) => rights,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(AdapterError::ListAccessRights(e)),
        };

        if let Some(rule) = rights
            .into_iter()
            .find(|r| r.matches(access_to, ACCESS_TYPE, ACCESS_LEVEL))
        {
            debug!("IP access right {} for share ID {} already exists", access_to, share_id);
            return Ok(rule);
        }

        let opts = GrantAccessOpts {
            access_type: ACCESS_TYPE,
            access_to: access_to.to_string(),
            access_level: ACCESS_LEVEL,
        };

        let rule = cancellable(cancel, args.client.grant_access(share_id, opts))
            .await
            .map_err(|_| AdapterError::Cancelled)?
            .map_err(AdapterError::GrantAccess)?;

        info!(share_id = %share_id, access_to, "Granted IP access");
        Ok(rule)
    }

    fn build_volume_context(&self, args: VolumeContextArgs<'_>) -> Result<HashMap<String, String>, AdapterError> {
        let idx = find_export_location(args.locations, any_export_location)
            .map_err(AdapterError::ExportLocation)?;

        let (server, share) = split_export_location_path(&args.locations[idx].path)
            .map_err(AdapterError::InvalidExportLocation)?;

        Ok(HashMap::from([
            ("server".to_string(), server.to_string()),
            ("share".to_string(), share.to_string()),
        ]))
    }

    fn build_node_stage_secret(&self, _args: SecretArgs<'_>) -> Result<HashMap<String, String>, AdapterError> {
        Ok(HashMap::new())
    }

    fn build_node_publish_secret(&self, _args: SecretArgs<'_>) -> Result<HashMap<String, String>, AdapterError> {
        Ok(HashMap::new())
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Share Adapter Trait
//!
//! One implementation per share protocol. An adapter decides which access
//! rule a node needs on a share, makes sure the rule exists and is usable,
//! and turns the result into the volume context and secrets handed to the
//! node plugin.
//!
//! Each variant fixes its own access type, access level and wait strategy.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::export_location::ExportLocationError;
use crate::domain::options::ShareOptions;
use crate::domain::share::{AccessRule, ExportLocation, Share, ShareId, ShareProtocol};
use crate::domain::share_client::{ShareAccessClient, ShareClientError};

/// Inputs for [`ShareAdapter::get_or_grant_access`]
#[derive(Clone, Copy)]
pub struct GrantAccessArgs<'a> {
    pub share: &'a Share,
    pub options: &'a ShareOptions,
    pub client: &'a dyn ShareAccessClient,
}

/// Inputs for [`ShareAdapter::build_volume_context`]
#[derive(Debug, Clone, Copy)]
pub struct VolumeContextArgs<'a> {
    pub locations: &'a [ExportLocation],
    pub options: &'a ShareOptions,
}

/// Inputs for the secret builders
#[derive(Debug, Clone, Copy)]
pub struct SecretArgs<'a> {
    pub access_rule: &'a AccessRule,
}

#[async_trait]
pub trait ShareAdapter: Send + Sync {
    /// Protocol served by this adapter
    fn protocol(&self) -> ShareProtocol;

    /// Ensure the access rule required by this adapter exists and is usable
    ///
    /// Every backend call and every wait honours `cancel`; once it fires the
    /// call returns [`AdapterError::Cancelled`].
    async fn get_or_grant_access(
        &self,
        args: GrantAccessArgs<'_>,
        cancel: &CancellationToken,
    ) -> Result<AccessRule, AdapterError>;

    /// Build the volume context passed to the node plugin
    fn build_volume_context(&self, args: VolumeContextArgs<'_>) -> Result<HashMap<String, String>, AdapterError>;

    /// Build the secret required to stage the volume on a node
    fn build_node_stage_secret(&self, args: SecretArgs<'_>) -> Result<HashMap<String, String>, AdapterError>;

    /// Build the secret required to publish the volume into a workload
    fn build_node_publish_secret(&self, args: SecretArgs<'_>) -> Result<HashMap<String, String>, AdapterError>;
}

/// Share adapter errors
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to list access rights: {0}")]
    ListAccessRights(#[source] ShareClientError),

    /// Grant failures keep the backend error intact for caller-side classification
    #[error(transparent)]
    GrantAccess(ShareClientError),

    #[error(transparent)]
    PollAccessRights(ShareClientError),

    #[error("cannot find the access right granted to '{access_to}' on share {share_id}")]
    AccessRuleVanished { share_id: ShareId, access_to: String },

    #[error("timed out waiting for an access key after {attempts} attempts")]
    WaitTimeout { attempts: u32 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to choose an export location: {0}")]
    ExportLocation(#[source] ExportLocationError),

    #[error(transparent)]
    InvalidExportLocation(ExportLocationError),
}

impl AdapterError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }
}

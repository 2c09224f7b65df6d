// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Share Options
//!
//! Caller-supplied parameters (StorageClass style `key: value` strings) that
//! steer the share adapters: which principal to grant access to and how the
//! share is mounted on the node.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Ceph mount tool selected for the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CephfsMounter {
    Fuse,
    Kernel,
}

impl CephfsMounter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fuse => "fuse",
            Self::Kernel => "kernel",
        }
    }
}

impl Default for CephfsMounter {
    fn default() -> Self {
        Self::Fuse
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShareOptions {
    /// Ceph client ID to grant access to. Defaults to the share name when empty.
    #[serde(rename = "cephfs-clientID", default)]
    pub cephfs_client_id: String,

    #[serde(rename = "cephfs-mounter", default)]
    pub cephfs_mounter: CephfsMounter,

    #[serde(rename = "cephfs-kernelMountOptions", default)]
    pub cephfs_kernel_mount_options: String,

    #[serde(rename = "cephfs-fuseMountOptions", default)]
    pub cephfs_fuse_mount_options: String,

    /// Address or CIDR granted access on NFS shares
    #[serde(rename = "nfs-shareClient", default = "default_nfs_share_client")]
    pub nfs_share_client: String,
}

fn default_nfs_share_client() -> String {
    "0.0.0.0/0".to_string()
}

impl Default for ShareOptions {
    fn default() -> Self {
        Self {
            cephfs_client_id: String::new(),
            cephfs_mounter: CephfsMounter::default(),
            cephfs_kernel_mount_options: String::new(),
            cephfs_fuse_mount_options: String::new(),
            nfs_share_client: default_nfs_share_client(),
        }
    }
}

impl ShareOptions {
    /// Parse options from a parameter map
    ///
    /// Unknown keys and invalid values are rejected.
    pub fn from_parameters(params: &HashMap<String, String>) -> Result<Self, OptionsError> {
        let value = serde_json::to_value(params)
            .map_err(|e| OptionsError::Invalid(e.to_string()))?;
        let options: Self = serde_json::from_value(value)
            .map_err(|e| OptionsError::Invalid(e.to_string()))?;

        if options.nfs_share_client.trim().is_empty() {
            return Err(OptionsError::Invalid("nfs-shareClient cannot be empty".to_string()));
        }

        Ok(options)
    }

    /// Set the Ceph client ID
    pub fn with_cephfs_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.cephfs_client_id = client_id.into();
        self
    }
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Invalid share options: {0}")]
    Invalid(String),
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Share Access Client Trait - Anti-Corruption Layer for Manila
//!
//! Isolates the share adapters from the Shared File Systems API. Adapters
//! only see this trait, which keeps them testable against an in-memory
//! backend and independent of the HTTP wire format.
//!
//! "Resource not found" is a dedicated error variant so callers can tell an
//! empty access list apart from a failed request without inspecting
//! messages.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::share::{AccessRule, ExportLocation, GrantAccessOpts, Share, ShareId};

#[async_trait]
pub trait ShareAccessClient: Send + Sync {
    /// Fetch a share by ID
    async fn get_share(&self, share_id: &ShareId) -> Result<Share, ShareClientError>;

    /// List the export locations of a share
    async fn get_export_locations(&self, share_id: &ShareId) -> Result<Vec<ExportLocation>, ShareClientError>;

    /// List every access rule granted on a share
    ///
    /// # Returns
    /// * `Err(ShareClientError::NotFound)` when the backend reports the
    ///   access list as missing. Adapters treat this as an empty list.
    async fn get_access_rights(&self, share_id: &ShareId) -> Result<Vec<AccessRule>, ShareClientError>;

    /// Grant a new access rule on a share
    ///
    /// The returned rule may not carry an access key yet.
    async fn grant_access(&self, share_id: &ShareId, opts: GrantAccessOpts) -> Result<AccessRule, ShareClientError>;
}

/// Share client errors
#[derive(Debug, Error)]
pub enum ShareClientError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Manila API returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout while communicating with Manila")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown share client error: {0}")]
    Unknown(String),
}

impl ShareClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for ShareClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ShareClientError::Timeout
        } else if err.is_connect() {
            ShareClientError::Network(err.to_string())
        } else if err.is_decode() {
            ShareClientError::Serialization(err.to_string())
        } else {
            ShareClientError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ShareClientError {
    fn from(err: serde_json::Error) -> Self {
        ShareClientError::Serialization(err.to_string())
    }
}

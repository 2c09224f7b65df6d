// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Manila HTTP Client
//!
//! Implements [`ShareAccessClient`] on top of the Shared File Systems API v2.
//!
//! # API Endpoints
//!
//! - `GET /shares/{id}` - Share details
//! - `GET /shares/{id}/export_locations` - Export locations
//! - `POST /shares/{id}/action` `{"access_list": null}` - List access rules
//! - `POST /shares/{id}/action` `{"allow_access": {...}}` - Grant access
//!
//! Requests carry a pre-issued Keystone token in `X-Auth-Token` and pin the
//! API microversion via `X-OpenStack-Manila-API-Version`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::domain::share::{AccessRule, ExportLocation, GrantAccessOpts, Share, ShareId};
use crate::domain::share_client::{ShareAccessClient, ShareClientError};

pub const DEFAULT_MICROVERSION: &str = "2.49";

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const MICROVERSION_HEADER: &str = "X-OpenStack-Manila-API-Version";

/// Manila Shared File Systems API adapter
pub struct ManilaClient {
    client: Client,

    /// Project scoped endpoint, e.g. "https://manila.example.com/v2/<project-id>"
    endpoint: String,

    token: String,

    microversion: String,
}

impl ManilaClient {
    /// Create new Manila client
    ///
    /// # Arguments
    /// * `endpoint` - Project scoped Shared File Systems endpoint
    /// * `token` - Keystone token sent with every request
    /// * `timeout` - Per-request timeout
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ShareClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShareClientError::Unknown(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            microversion: DEFAULT_MICROVERSION.to_string(),
        })
    }

    /// Pin a different API microversion
    pub fn with_microversion(mut self, microversion: impl Into<String>) -> Self {
        self.microversion = microversion.into();
        self
    }

    /// Build full URL for API path
    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.build_url(path))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .header(MICROVERSION_HEADER, &self.microversion)
    }

    async fn share_action(&self, share_id: &ShareId, body: serde_json::Value) -> Result<Response, ShareClientError> {
        let path = format!("/shares/{}/action", share_id);
        let response = self.request(Method::POST, &path).json(&body).send().await?;
        check_status(response, &format!("share {}", share_id)).await
    }
}

/// Map non-success responses onto [`ShareClientError`]
async fn check_status(response: Response, resource: &str) -> Result<Response, ShareClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| format!("HTTP {}", status));

    Err(match status {
        StatusCode::NOT_FOUND => ShareClientError::NotFound(resource.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ShareClientError::Unauthorized(message),
        status => ShareClientError::Http {
            status: status.as_u16(),
            message,
        },
    })
}

#[async_trait]
impl ShareAccessClient for ManilaClient {
    async fn get_share(&self, share_id: &ShareId) -> Result<Share, ShareClientError> {
        let path = format!("/shares/{}", share_id);
        let response = self.request(Method::GET, &path).send().await?;
        let response = check_status(response, &format!("share {}", share_id)).await?;

        let body: ShareResponse = response.json().await?;
        Ok(body.share)
    }

    async fn get_export_locations(&self, share_id: &ShareId) -> Result<Vec<ExportLocation>, ShareClientError> {
        let path = format!("/shares/{}/export_locations", share_id);
        let response = self.request(Method::GET, &path).send().await?;
        let response = check_status(response, &format!("export locations of share {}", share_id)).await?;

        let body: ExportLocationsResponse = response.json().await?;
        Ok(body.export_locations)
    }

    async fn get_access_rights(&self, share_id: &ShareId) -> Result<Vec<AccessRule>, ShareClientError> {
        let response = self.share_action(share_id, json!({ "access_list": null })).await?;

        let body: AccessListResponse = response.json().await?;
        debug!(share_id = %share_id, count = body.access_list.len(), "Listed access rules");
        Ok(body.access_list)
    }

    async fn grant_access(&self, share_id: &ShareId, opts: GrantAccessOpts) -> Result<AccessRule, ShareClientError> {
        let response = self
            .share_action(share_id, json!({ "allow_access": opts }))
            .await?;

        let body: AllowAccessResponse = response.json().await?;
        Ok(body.access)
    }
}

// ============================================================================
// Manila API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ShareResponse {
    share: Share,
}

#[derive(Debug, Deserialize)]
struct ExportLocationsResponse {
    export_locations: Vec<ExportLocation>,
}

#[derive(Debug, Deserialize)]
struct AccessListResponse {
    access_list: Vec<AccessRule>,
}

#[derive(Debug, Deserialize)]
struct AllowAccessResponse {
    access: AccessRule,
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Share Backend Infrastructure Module
//!
//! Provides concrete implementations of the ShareAccessClient trait.

pub mod client;
pub mod in_memory;

pub use client::ManilaClient;
pub use in_memory::InMemoryShareClient;

use std::sync::Arc;
use std::time::Duration;

use crate::domain::share_client::{ShareAccessClient, ShareClientError};

/// Share backend configuration
#[derive(Debug, Clone)]
pub enum ShareBackend {
    /// OpenStack Manila (production)
    Manila {
        endpoint: String,
        token: String,
        microversion: String,
        timeout: Duration,
    },

    /// In-memory backend for testing
    InMemory,
}

/// Factory function to create a share client from configuration
pub fn create_share_client(backend: ShareBackend) -> Result<Arc<dyn ShareAccessClient>, ShareClientError> {
    match backend {
        ShareBackend::Manila {
            endpoint,
            token,
            microversion,
            timeout,
        } => {
            let client = ManilaClient::new(endpoint, token, timeout)?.with_microversion(microversion);
            Ok(Arc::new(client))
        }
        ShareBackend::InMemory => Ok(Arc::new(InMemoryShareClient::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_manila() {
        let client = create_share_client(ShareBackend::Manila {
            endpoint: "http://localhost:8786/v2/project".to_string(),
            token: "token".to_string(),
            microversion: "2.51".to_string(),
            timeout: Duration::from_secs(10),
        })
        .unwrap();

        assert_eq!(Arc::strong_count(&client), 1);
    }

    #[tokio::test]
    async fn test_factory_in_memory() {
        let client = create_share_client(ShareBackend::InMemory).unwrap();
        let err = client
            .get_share(&crate::domain::share::ShareId::new("nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}

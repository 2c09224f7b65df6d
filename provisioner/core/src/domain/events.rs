// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Access Domain Events
//
// Published by the access service as share access is reconciled.
// Consumers (CLI progress output, audit sinks) subscribe via the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::share::{AccessType, ShareId, ShareProtocol};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AccessEvent {
    /// Reconciliation started for a share
    AccessRequested {
        share_id: ShareId,
        share_proto: ShareProtocol,
        requested_at: DateTime<Utc>,
    },
    /// The access rule is usable
    AccessProvisioned {
        share_id: ShareId,
        access_rule_id: String,
        access_type: AccessType,
        access_to: String,
        provisioned_at: DateTime<Utc>,
    },
    AccessProvisioningFailed {
        share_id: ShareId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}

impl AccessEvent {
    pub fn share_id(&self) -> &ShareId {
        match self {
            AccessEvent::AccessRequested { share_id, .. } => share_id,
            AccessEvent::AccessProvisioned { share_id, .. } => share_id,
            AccessEvent::AccessProvisioningFailed { share_id, .. } => share_id,
        }
    }
}

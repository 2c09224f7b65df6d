// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Share Domain Model
//!
//! Value objects mirroring the Manila Shared File Systems resources the
//! provisioner reads and writes: shares, their export locations and the
//! access rules granted on them.
//!
//! The backend owns every one of these resources. The provisioner only ever
//! holds a transient copy obtained from the most recent API call.

use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects
// ============================================================================

/// Opaque Manila share identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareId(pub String);

impl ShareId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ShareId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Share protocol as advertised by Manila (`share_proto`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareProtocol {
    #[serde(rename = "CEPHFS")]
    CephFs,
    #[serde(rename = "NFS")]
    Nfs,
    /// Any protocol without a share adapter (CIFS, GLUSTERFS, HDFS, ...)
    #[serde(other)]
    Unsupported,
}

impl std::fmt::Display for ShareProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CephFs => write!(f, "CEPHFS"),
            Self::Nfs => write!(f, "NFS"),
            Self::Unsupported => write!(f, "UNSUPPORTED"),
        }
    }
}

/// Authentication scheme of an access rule (`access_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Ceph client identity; the backend assigns a cephx key asynchronously
    Cephx,
    /// IP address or CIDR based access
    Ip,
    User,
    Cert,
    #[serde(other)]
    Other,
}

/// Permission level of an access rule (`access_level`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Read-write
    Rw,
    /// Read-only
    Ro,
}

// ============================================================================
// Resources
// ============================================================================

/// A Manila share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub id: ShareId,

    /// Human-readable share name. Used as the default access principal.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    pub share_proto: ShareProtocol,

    /// Size in GiB
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub status: String,
}

/// A network path through which a share can be mounted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLocation {
    #[serde(default)]
    pub id: String,

    /// Protocol specific path, e.g. `10.0.0.1:6789,10.0.0.2:6789:/volumes/_nogroup/abc`
    pub path: String,

    #[serde(default)]
    pub share_instance_id: String,

    #[serde(default)]
    pub is_admin_only: bool,

    #[serde(default)]
    pub preferred: bool,
}

/// An access rule granted on a share
///
/// `access_key` is empty until the backend has provisioned credential
/// material for the rule. Only cephx rules ever receive one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub share_id: String,

    pub access_type: AccessType,

    /// Principal the rule grants access to
    pub access_to: String,

    pub access_level: AccessLevel,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub access_key: String,

    #[serde(default)]
    pub state: String,
}

impl AccessRule {
    /// Whether the backend has attached credential material to this rule
    pub fn has_access_key(&self) -> bool {
        !self.access_key.is_empty()
    }

    /// Whether this rule grants `access_to` with exactly the given type and level
    pub fn matches(&self, access_to: &str, access_type: AccessType, access_level: AccessLevel) -> bool {
        self.access_to == access_to
            && self.access_type == access_type
            && self.access_level == access_level
    }
}

/// Request body for granting a new access rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantAccessOpts {
    pub access_type: AccessType,
    pub access_to: String,
    pub access_level: AccessLevel,
}

// Manila reports `null` for unnamed shares and for rules without a key.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_rule_from_manila_json() {
        let json = r#"{
            "id": "a25b2df3-90bd-4add-afa6-5f0dbbd50452",
            "share_id": "1b8facf4-b35d-4e4f-a4c2-aaa3e5b0e1d4",
            "access_type": "cephx",
            "access_to": "alice",
            "access_key": null,
            "access_level": "rw",
            "state": "new"
        }"#;

        let rule: AccessRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.access_type, AccessType::Cephx);
        assert_eq!(rule.access_level, AccessLevel::Rw);
        assert_eq!(rule.access_key, "");
        assert!(!rule.has_access_key());
        assert!(rule.matches("alice", AccessType::Cephx, AccessLevel::Rw));
        assert!(!rule.matches("alice", AccessType::Cephx, AccessLevel::Ro));
        assert!(!rule.matches("bob", AccessType::Cephx, AccessLevel::Rw));
    }

    #[test]
    fn test_unnamed_share_from_manila_json() {
        let share: Share = serde_json::from_str(
            r#"{"id": "s1", "name": null, "share_proto": "CEPHFS", "size": 1, "status": "available"}"#,
        )
        .unwrap();
        assert_eq!(share.name, "");
        assert_eq!(share.share_proto, ShareProtocol::CephFs);

        let share: Share = serde_json::from_str(r#"{"id": "s2", "share_proto": "NFS"}"#).unwrap();
        assert_eq!(share.name, "");
    }

    #[test]
    fn test_unknown_protocol_and_access_type() {
        let share: Share = serde_json::from_str(
            r#"{"id": "s1", "name": "myshare", "share_proto": "CIFS"}"#,
        )
        .unwrap();
        assert_eq!(share.share_proto, ShareProtocol::Unsupported);

        let rule: AccessRule = serde_json::from_str(
            r#"{"access_type": "kerberos", "access_to": "x", "access_level": "ro"}"#,
        )
        .unwrap();
        assert_eq!(rule.access_type, AccessType::Other);
    }
}

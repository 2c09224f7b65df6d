// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory share backend for testing and local runs.
//!
//! Mimics Manila closely enough to drive the share adapters: cephx rules
//! receive their key only after a configurable number of access listings,
//! and failures can be queued for the next list or grant call.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::domain::share::{AccessLevel, AccessRule, AccessType, ExportLocation, GrantAccessOpts, Share, ShareId};
use crate::domain::share_client::{ShareAccessClient, ShareClientError};

struct StoredRule {
    rule: AccessRule,
    /// Listings left before the key is assigned; `None` once settled
    lists_until_key: Option<u32>,
}

#[derive(Default)]
struct State {
    shares: HashMap<ShareId, (Share, Vec<ExportLocation>)>,
    rules: HashMap<ShareId, Vec<StoredRule>>,
    list_failures: VecDeque<ShareClientError>,
    grant_failures: VecDeque<ShareClientError>,
    export_location_failures: VecDeque<ShareClientError>,
    /// `None` means cephx keys are never assigned
    access_key_delay: Option<u32>,
    list_calls: usize,
    grant_calls: usize,
    next_rule: u64,
}

pub struct InMemoryShareClient {
    state: Mutex<State>,
}

impl InMemoryShareClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                access_key_delay: Some(1),
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Poisoned locks are recovered; the state is plain data.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_share(&self, share: Share, export_locations: Vec<ExportLocation>) {
        let mut state = self.state();
        state.rules.entry(share.id.clone()).or_default();
        state.shares.insert(share.id.clone(), (share, export_locations));
    }

    /// Store a settled access rule
    pub fn insert_access_rule(
        &self,
        share_id: &ShareId,
        access_to: &str,
        access_type: AccessType,
        access_level: AccessLevel,
        access_key: &str,
    ) -> AccessRule {
        let mut state = self.state();
        state.next_rule += 1;
        let rule = AccessRule {
            id: format!("rule-{}", state.next_rule),
            share_id: share_id.to_string(),
            access_type,
            access_to: access_to.to_string(),
            access_level,
            access_key: access_key.to_string(),
            state: "active".to_string(),
        };
        state.rules.entry(share_id.clone()).or_default().push(StoredRule {
            rule: rule.clone(),
            lists_until_key: None,
        });
        rule
    }

    /// Remove every access rule of a share
    pub fn revoke_all(&self, share_id: &ShareId) {
        if let Some(rules) = self.state().rules.get_mut(share_id) {
            rules.clear();
        }
    }

    /// Number of listings after a cephx grant before the key shows up
    ///
    /// `0` returns the key straight from the grant call.
    pub fn set_access_key_delay(&self, lists: u32) {
        self.state().access_key_delay = Some(lists);
    }

    /// Never assign cephx keys to new rules
    pub fn disable_access_key_assignment(&self) {
        self.state().access_key_delay = None;
    }

    pub fn fail_next_list(&self, error: ShareClientError) {
        self.state().list_failures.push_back(error);
    }

    pub fn fail_next_grant(&self, error: ShareClientError) {
        self.state().grant_failures.push_back(error);
    }

    pub fn fail_next_export_locations(&self, error: ShareClientError) {
        self.state().export_location_failures.push_back(error);
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn grant_calls(&self) -> usize {
        self.state().grant_calls
    }
}

impl Default for InMemoryShareClient {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_access_key(rule_id: &str) -> String {
    format!("AQ{}==", rule_id.replace('-', ""))
}

#[async_trait]
impl ShareAccessClient for InMemoryShareClient {
    async fn get_share(&self, share_id: &ShareId) -> Result<Share, ShareClientError> {
        self.state()
            .shares
            .get(share_id)
            .map(|(share, _)| share.clone())
            .ok_or_else(|| ShareClientError::NotFound(format!("share {}", share_id)))
    }

    async fn get_export_locations(&self, share_id: &ShareId) -> Result<Vec<ExportLocation>, ShareClientError> {
        let mut state = self.state();
        if let Some(error) = state.export_location_failures.pop_front() {
            return Err(error);
        }
        state
            .shares
            .get(share_id)
            .map(|(_, locations)| locations.clone())
            .ok_or_else(|| ShareClientError::NotFound(format!("share {}", share_id)))
    }

    async fn get_access_rights(&self, share_id: &ShareId) -> Result<Vec<AccessRule>, ShareClientError> {
        let mut state = self.state();
        state.list_calls += 1;

        if let Some(error) = state.list_failures.pop_front() {
            return Err(error);
        }

        let rules = state
            .rules
            .get_mut(share_id)
            .ok_or_else(|| ShareClientError::NotFound(format!("share {}", share_id)))?;

        for stored in rules.iter_mut() {
            match stored.lists_until_key {
                Some(0) | Some(1) => {
                    stored.rule.access_key = generate_access_key(&stored.rule.id);
                    stored.rule.state = "active".to_string();
                    stored.lists_until_key = None;
                }
                Some(n) => stored.lists_until_key = Some(n - 1),
                None => {}
            }
        }

        Ok(rules.iter().map(|stored| stored.rule.clone()).collect())
    }

    async fn grant_access(&self, share_id: &ShareId, opts: GrantAccessOpts) -> Result<AccessRule, ShareClientError> {
        let mut state = self.state();
        state.grant_calls += 1;

        if let Some(error) = state.grant_failures.pop_front() {
            return Err(error);
        }

        if !state.shares.contains_key(share_id) {
            return Err(ShareClientError::NotFound(format!("share {}", share_id)));
        }

        state.next_rule += 1;
        let id = format!("rule-{}", state.next_rule);
        let key_delay = match opts.access_type {
            AccessType::Cephx => state.access_key_delay,
            _ => None,
        };

        let mut rule = AccessRule {
            id,
            share_id: share_id.to_string(),
            access_type: opts.access_type,
            access_to: opts.access_to,
            access_level: opts.access_level,
            access_key: String::new(),
            state: "new".to_string(),
        };

        let lists_until_key = match key_delay {
            Some(0) => {
                rule.access_key = generate_access_key(&rule.id);
                rule.state = "active".to_string();
                None
            }
            Some(n) => Some(n),
            None if rule.access_type == AccessType::Cephx => Some(u32::MAX),
            None => {
                rule.state = "active".to_string();
                None
            }
        };

        state.rules.entry(share_id.clone()).or_default().push(StoredRule {
            rule: rule.clone(),
            lists_until_key,
        });

        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::share::ShareProtocol;

    fn share(id: &str) -> Share {
        Share {
            id: ShareId::new(id),
            name: format!("{}-name", id),
            share_proto: ShareProtocol::CephFs,
            size: 1,
            status: "available".to_string(),
        }
    }

    fn cephx(access_to: &str) -> GrantAccessOpts {
        GrantAccessOpts {
            access_type: AccessType::Cephx,
            access_to: access_to.to_string(),
            access_level: AccessLevel::Rw,
        }
    }

    #[tokio::test]
    async fn test_cephx_key_assigned_after_listings() {
        let client = InMemoryShareClient::new();
        client.insert_share(share("s1"), vec![]);
        client.set_access_key_delay(2);

        let id = ShareId::new("s1");
        let granted = client.grant_access(&id, cephx("alice")).await.unwrap();
        assert!(!granted.has_access_key());

        assert!(!client.get_access_rights(&id).await.unwrap()[0].has_access_key());
        assert!(client.get_access_rights(&id).await.unwrap()[0].has_access_key());
        assert_eq!(client.list_calls(), 2);
        assert_eq!(client.grant_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_share_and_queued_failures() {
        let client = InMemoryShareClient::new();
        let missing = ShareId::new("missing");
        assert!(client.get_access_rights(&missing).await.unwrap_err().is_not_found());
        assert!(client.get_share(&missing).await.unwrap_err().is_not_found());

        client.insert_share(share("s1"), vec![]);
        client.fail_next_list(ShareClientError::Timeout);
        let id = ShareId::new("s1");
        assert!(matches!(client.get_access_rights(&id).await, Err(ShareClientError::Timeout)));
        assert!(client.get_access_rights(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_never_assigned_when_disabled() {
        let client = InMemoryShareClient::new();
        client.insert_share(share("s1"), vec![]);
        client.disable_access_key_assignment();

        let id = ShareId::new("s1");
        client.grant_access(&id, cephx("alice")).await.unwrap();
        for _ in 0..5 {
            assert!(!client.get_access_rights(&id).await.unwrap()[0].has_access_key());
        }
    }
}

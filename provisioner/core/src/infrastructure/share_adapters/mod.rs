// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Share Adapters
//!
//! Concrete [`ShareAdapter`] implementations, one per supported share protocol.

pub mod cephfs;
pub mod nfs;

pub use cephfs::Cephfs;
pub use nfs::Nfs;

use std::sync::Arc;

use crate::domain::adapter::ShareAdapter;
use crate::domain::backoff::Backoff;
use crate::domain::share::ShareProtocol;

/// Factory function returning the adapter for a share protocol
///
/// `access_key_wait` is the policy used by adapters that wait for
/// credential material. Returns `None` for protocols without an adapter.
pub fn create_share_adapter(protocol: ShareProtocol, access_key_wait: Backoff) -> Option<Arc<dyn ShareAdapter>> {
    match protocol {
        ShareProtocol::CephFs => Some(Arc::new(Cephfs::with_backoff(access_key_wait))),
        ShareProtocol::Nfs => Some(Arc::new(Nfs)),
        ShareProtocol::Unsupported => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_by_protocol() {
        let cephfs = create_share_adapter(ShareProtocol::CephFs, Backoff::default()).unwrap();
        assert_eq!(cephfs.protocol(), ShareProtocol::CephFs);

        let nfs = create_share_adapter(ShareProtocol::Nfs, Backoff::default()).unwrap();
        assert_eq!(nfs.protocol(), ShareProtocol::Nfs);

        assert!(create_share_adapter(ShareProtocol::Unsupported, Backoff::default()).is_none());
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod access_service;

pub use access_service::{AccessService, ProvisionedAccess, StandardAccessService};

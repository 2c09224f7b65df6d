// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Manila Provisioner Core
//!
//! Access reconciliation for OpenStack Manila shares mounted by a node plugin.
//!
//! # Architecture
//!
//! - **Domain:** share model, adapter trait, options, wait policy, config
//! - **Infrastructure:** Manila client, share adapters, event bus, wait loop
//! - **Application:** access service tying the two together

pub mod domain;
pub mod application;
pub mod infrastructure;

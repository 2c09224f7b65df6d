// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Share model and the seams the infrastructure implements.

pub mod share;
pub mod share_client;
pub mod options;
pub mod export_location;
pub mod adapter;
pub mod events;
pub mod backoff;
pub mod config;

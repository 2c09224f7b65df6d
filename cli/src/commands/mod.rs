// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for manilactl

pub mod access;
pub mod config;

pub use self::access::AccessCommand;
pub use self::config::ConfigCommand;

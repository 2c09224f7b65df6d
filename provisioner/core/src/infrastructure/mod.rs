// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod manila;
pub mod share_adapters;
pub mod wait;

pub use event_bus::EventBus;

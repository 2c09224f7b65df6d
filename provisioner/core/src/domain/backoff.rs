// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Backoff Policy
//!
//! Bounded exponential backoff parameters. The delay starts at
//! `initial_delay` and is multiplied by `factor` after every step; at most
//! `steps` attempts are made.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wait policy for cephx access keys: 5s, x1.2, 10 attempts
pub const ACCESS_KEY_INITIAL_DELAY: Duration = Duration::from_secs(5);
pub const ACCESS_KEY_BACKOFF_FACTOR: f64 = 1.2;
pub const ACCESS_KEY_MAX_ATTEMPTS: u32 = 10;

/// Ceiling for a single delay; growth saturates here
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    /// Delay slept after the first unsuccessful attempt
    #[serde(with = "humantime_serde", default = "default_initial_delay")]
    pub initial_delay: Duration,

    /// Multiplier applied to the delay after every step
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Maximum number of attempts
    #[serde(default = "default_steps")]
    pub steps: u32,
}

fn default_initial_delay() -> Duration {
    ACCESS_KEY_INITIAL_DELAY
}

fn default_factor() -> f64 {
    ACCESS_KEY_BACKOFF_FACTOR
}

fn default_steps() -> u32 {
    ACCESS_KEY_MAX_ATTEMPTS
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: ACCESS_KEY_INITIAL_DELAY,
            factor: ACCESS_KEY_BACKOFF_FACTOR,
            steps: ACCESS_KEY_MAX_ATTEMPTS,
        }
    }
}

impl Backoff {
    pub fn new(initial_delay: Duration, factor: f64, steps: u32) -> Self {
        Self {
            initial_delay,
            factor,
            steps,
        }
    }

    /// Consume one step and return the delay to sleep before the next attempt
    pub fn step(&mut self) -> Duration {
        let delay = self.initial_delay;
        self.steps = self.steps.saturating_sub(1);
        self.initial_delay = Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * self.factor)
            .map_or(MAX_BACKOFF_DELAY, |next| next.min(MAX_BACKOFF_DELAY));
        delay
    }

    /// Delays slept between `attempts` consecutive attempts
    ///
    /// The first attempt runs immediately, so `n` attempts sleep `n - 1` times.
    pub fn delays(&self, attempts: u32) -> Vec<Duration> {
        let mut backoff = *self;
        (1..attempts.min(self.steps)).map(|_| backoff.step()).collect()
    }

    /// Upper bound of the time spent sleeping when every attempt is used
    pub fn max_total_delay(&self) -> Duration {
        self.delays(self.steps).into_iter().sum()
    }
}

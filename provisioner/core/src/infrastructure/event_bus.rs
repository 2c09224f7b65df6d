// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Access Events
//
// In-memory event streaming over a tokio broadcast channel.
// Events published without subscribers are dropped.

use crate::domain::events::AccessEvent;
use crate::domain::share::ShareId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to access events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AccessEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (256)
    pub fn with_default_capacity() -> Self {
        Self::new(256)
    }

    /// Publish an access event to all subscribers
    pub fn publish_access_event(&self, event: AccessEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all access events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            share_id: None,
        }
    }

    /// Subscribe to the events of a single share
    pub fn subscribe_share(&self, share_id: ShareId) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            share_id: Some(share_id),
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for access events, optionally filtered by share
pub struct EventReceiver {
    receiver: broadcast::Receiver<AccessEvent>,
    share_id: Option<ShareId>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<AccessEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;

            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<AccessEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(|e| match e {
                broadcast::error::TryRecvError::Empty => EventBusError::Empty,
                broadcast::error::TryRecvError::Closed => EventBusError::Closed,
                broadcast::error::TryRecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;

            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    fn accepts(&self, event: &AccessEvent) -> bool {
        match &self.share_id {
            Some(share_id) => event.share_id() == share_id,
            None => true,
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

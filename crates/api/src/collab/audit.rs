//! Bounded in-memory feed of recent audit events.

use std::collections::VecDeque;

use tandem_core::collaboration::MAX_AUDIT_FEED_CAPACITY;
use tandem_core::protocol::AuditEvent;
use tokio::sync::Mutex;

pub struct AuditFeed {
    capacity: usize,
    events: Mutex<VecDeque<AuditEvent>>,
}

impl AuditFeed {
    /// `capacity` is clamped to `1..=100`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_AUDIT_FEED_CAPACITY);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, evicting the oldest when full.
    pub async fn push(&self, event: AuditEvent) {
        let mut events = self.events.lock().await;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Retained events, oldest first.
    pub async fn recent(&self) -> Vec<AuditEvent> {
        self.events.lock().await.iter().cloned().collect()
    }
}

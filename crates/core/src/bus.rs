// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process pub/sub for [`SystemEvent`]s.
//!
//! Each subscriber gets its own bounded queue so one slow consumer (a
//! lagging IPC client, say) can't back up another. Publish is
//! non-blocking: a full subscriber queue drops the event rather than
//! stalling the publisher, on the theory that a subscriber who can't keep
//! up with a hundred buffered events needs a full re-sync, not backpressure
//! on the rest of the system.

use crate::event::SystemEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<SystemEvent>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// A live subscription. Dropping it unregisters the subscriber.
pub struct EventSubscription {
    id: u64,
    bus: Arc<Mutex<Inner>>,
    pub rx: mpsc::Receiver<SystemEvent>,
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.lock().subscribers.retain(|s| s.id != self.id);
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber { id, tx });
        EventSubscription {
            id,
            bus: Arc::clone(&self.inner),
            rx,
        }
    }

    /// Publish to every current subscriber. Never blocks and never fails:
    /// a subscriber with a full queue silently misses this event.
    pub fn publish(&self, event: SystemEvent) {
        let subscribers = self.inner.lock().subscribers.iter().map(|s| s.tx.clone()).collect::<Vec<_>>();
        for tx in subscribers {
            let _ = tx.try_send(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;

    fn sample_event() -> SystemEvent {
        SystemEvent::SessionEnded {
            session_id: SessionId::new("s1"),
            reason: None,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(sample_event());
        let received = sub.rx.recv().await.unwrap();
        assert_eq!(received, sample_event());
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters_it() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_event_without_blocking() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        for _ in 0..(SUBSCRIBER_QUEUE_CAPACITY + 10) {
            bus.publish(sample_event());
        }
        // publisher never blocked getting here; drain what made it through
        let mut count = 0;
        while sub.rx.try_recv().is_ok() {
            count += 1;
        }
        assert!(count <= SUBSCRIBER_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn independent_subscribers_each_get_their_own_copy() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(sample_event());
        assert!(a.rx.recv().await.is_some());
        assert!(b.rx.recv().await.is_some());
    }
}

//! Device change events
//!
//! The registry publishes one event per registration, unregistration and
//! flushed content change. Subscribers receive events over an unbounded
//! tokio channel, optionally filtered to a single device; a subscription
//! lives until its receiver is dropped or its device is unregistered.
//!
//! ```
//! use openigtlink_devices::device::DeviceKey;
//! use openigtlink_devices::event::{DeviceEvent, DeviceEventKind, EventBus};
//!
//! let mut bus = EventBus::new();
//! let mut all = bus.subscribe(None);
//! let key = DeviceKey::new("IMAGE", "Probe1");
//! bus.publish(DeviceEvent::new(key.clone(), DeviceEventKind::ContentModified));
//! assert_eq!(all.try_next().unwrap().key, key);
//! ```

use crate::device::DeviceKey;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::trace;

pub type SubscriptionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEventKind {
    Registered,
    ContentModified,
    Unregistered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub key: DeviceKey,
    pub kind: DeviceEventKind,
}

impl DeviceEvent {
    pub fn new(key: DeviceKey, kind: DeviceEventKind) -> Self {
        DeviceEvent { key, kind }
    }
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    filter: Option<DeviceKey>,
    tx: mpsc::UnboundedSender<DeviceEvent>,
}

impl Subscriber {
    fn wants(&self, key: &DeviceKey) -> bool {
        self.filter.as_ref().map_or(true, |f| f == key)
    }
}

/// Fan-out of device events to subscribers
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: SubscriptionId,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every device (`None`) or to one device
    pub fn subscribe(&mut self, filter: Option<DeviceKey>) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push(Subscriber { id, filter, tx });
        EventSubscription {
            id,
            rx,
            closed: false,
        }
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    /// Deliver `event` to matching subscribers; returns how many received it
    ///
    /// Subscribers whose receiver was dropped are removed.
    pub fn publish(&mut self, event: DeviceEvent) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|s| {
            if !s.wants(&event.key) {
                return !s.tx.is_closed();
            }
            match s.tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        trace!(device = %event.key, kind = ?event.kind, delivered, "Published device event");
        delivered
    }

    /// Close every subscription filtered to `key`
    pub fn close_filtered(&mut self, key: &DeviceKey) {
        self.subscribers
            .retain(|s| s.filter.as_ref().map_or(true, |f| f != key));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Receiving end of a subscription
#[derive(Debug)]
pub struct EventSubscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<DeviceEvent>,
    closed: bool,
}

impl EventSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next queued event without waiting
    pub fn try_next(&mut self) -> Option<DeviceEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// All queued events
    pub fn drain(&mut self) -> Vec<DeviceEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Wait for the next event; `None` once the bus dropped this subscription
    pub async fn recv(&mut self) -> Option<DeviceEvent> {
        let event = self.rx.recv().await;
        if event.is_none() {
            self.closed = true;
        }
        event
    }

    /// True once a receive observed that the bus side is gone
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

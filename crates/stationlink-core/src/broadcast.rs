//! Fan-out of readings to subscribers.
//!
//! [`BroadcastDistributor`] pushes messages to any number of subscribers
//! over bounded channels. Delivery failures are isolated per subscriber: a
//! subscriber whose channel is closed or full is dropped on the spot, and
//! the publish continues to the rest. Publishing never fails from the
//! producer's point of view.
//!
//! New subscribers receive a history burst first, so late joiners see the
//! recent past before live data starts flowing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use stationlink_types::SensorReading;

use crate::manager::ConnectionStatus;

/// Default per-subscriber channel capacity.
const DEFAULT_CAPACITY: usize = 64;

/// Identifies one subscriber for later removal.
pub type SubscriberId = u64;

/// A message pushed to subscribers.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// One live reading.
    Reading(SensorReading),
    /// Recent readings sent once when a subscriber joins, oldest first.
    History(Vec<SensorReading>),
    /// A connection status sample.
    Status(ConnectionStatus),
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    r#type: &'static str,
    data: &'a T,
}

// Live readings go over the wire as bare reading objects; only the history
// burst and status samples carry a type envelope.
impl Serialize for BroadcastMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Reading(reading) => reading.serialize(serializer),
            Self::History(data) => Envelope {
                r#type: "history",
                data,
            }
            .serialize(serializer),
            Self::Status(data) => Envelope {
                r#type: "status",
                data,
            }
            .serialize(serializer),
        }
    }
}

/// Pushes messages to subscribers with per-subscriber failure isolation.
pub struct BroadcastDistributor {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<BroadcastMessage>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for BroadcastDistributor {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastDistributor {
    /// Create a distributor with the given per-subscriber channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            capacity,
        }
    }

    /// Register a subscriber and deliver the history burst.
    ///
    /// `history` is the recent-readings backlog, oldest first; it arrives as
    /// a single [`BroadcastMessage::History`] before any live message.
    pub fn subscribe(
        &self,
        history: Vec<SensorReading>,
    ) -> (SubscriberId, mpsc::Receiver<BroadcastMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(self.capacity);

        // The channel is brand new, so the burst always fits.
        let _ = tx.try_send(BroadcastMessage::History(history));

        self.subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .insert(id, tx);
        debug!(subscriber = id, "subscriber added");
        (id, rx)
    }

    /// Remove a subscriber by id. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self
            .subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .remove(&id)
            .is_some();
        if removed {
            debug!(subscriber = id, "subscriber removed");
        }
        removed
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .len()
    }

    /// Deliver a message to every subscriber.
    ///
    /// Subscribers that cannot accept the message (closed or full channel)
    /// are removed immediately; the remaining subscribers are unaffected.
    /// Returns the number of successful deliveries.
    pub fn publish(&self, message: &BroadcastMessage) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("subscriber registry poisoned");

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (&id, tx) in subscribers.iter() {
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(subscriber = id, error = %e, "dropping unreachable subscriber");
                    dead.push(id);
                }
            }
        }
        for id in dead {
            subscribers.remove(&id);
        }
        delivered
    }
}

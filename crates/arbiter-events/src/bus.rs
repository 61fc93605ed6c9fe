use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::error::RunErrorKind;
use crate::event::{Event, EventPayload};
use crate::ids::{RunId, SessionId};

/// Bound on a subscriber's outbound channel. A subscriber that cannot keep up
/// is dropped and notified once with `run_error(kind=stream_overflow)`
/// (best-effort; if even that send fails, it is silently dropped).
const SUBSCRIBER_BUFFER: usize = 256;

pub type Subscriber = mpsc::Receiver<Event>;

struct SubscriberSlot {
    id: u64,
    tx: mpsc::Sender<Event>,
}

/// A per-run, in-process fan-out of a bounded, ordered event sequence.
///
/// Publishers never block on a slow subscriber beyond `SUBSCRIBER_BUFFER`
/// queued events; a subscriber that falls that far behind is dropped.
pub struct EventBus {
    run_id: RunId,
    session_id: Option<SessionId>,
    seq: AtomicU64,
    subscribers: Mutex<Vec<SubscriberSlot>>,
    next_subscriber_id: AtomicU64,
}

impl EventBus {
    pub fn new(run_id: RunId, session_id: Option<SessionId>) -> Arc<Self> {
        Arc::new(Self {
            run_id,
            session_id,
            seq: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
        })
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Subscribe to this run's events. Late subscribers only see events
    /// published after they subscribe; replaying a `state_snapshot` to a
    /// late joiner is the State Sync component's responsibility, not the
    /// bus's.
    pub async fn subscribe(&self) -> Subscriber {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().await.push(SubscriberSlot { id, tx });
        rx
    }

    /// Allocate the next sequence number and publish an event built from it.
    pub async fn publish(&self, payload: EventPayload) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            run_id: self.run_id,
            session_id: self.session_id,
            seq,
            timestamp: Utc::now(),
            payload,
        };
        self.dispatch(event).await;
        seq
    }

    async fn dispatch(&self, event: Event) {
        let mut subscribers = self.subscribers.lock().await;
        let mut dead: Vec<u64> = Vec::new();
        let mut overflowed: Vec<u64> = Vec::new();
        for slot in subscribers.iter() {
            match slot.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = slot.id, run_id = %self.run_id, "event subscriber overflowed, dropping it");
                    dead.push(slot.id);
                    overflowed.push(slot.id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Receiver dropped; nothing to notify.
                    dead.push(slot.id);
                }
            }
        }
        for id in &overflowed {
            if let Some(slot) = subscribers.iter().find(|s| s.id == *id) {
                let overflow = Event {
                    run_id: self.run_id,
                    session_id: self.session_id,
                    seq: self.seq.fetch_add(1, Ordering::SeqCst),
                    timestamp: Utc::now(),
                    payload: EventPayload::RunError {
                        kind: RunErrorKind::StreamOverflow,
                        message: "subscriber buffer overflowed".into(),
                        details: None,
                    },
                };
                let _ = slot.tx.try_send(overflow);
            }
        }
        if !dead.is_empty() {
            subscribers.retain(|s| !dead.contains(&s.id));
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_delivered_in_sequence_order() {
        let bus = EventBus::new(RunId::new(), None);
        let mut rx = bus.subscribe().await;
        bus.publish(EventPayload::RunStarted).await;
        bus.publish(EventPayload::RunFinished).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert!(second.seq > first.seq);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_every_event() {
        let bus = EventBus::new(RunId::new(), None);
        let mut a = bus.subscribe().await;
        let mut b = bus.subscribe().await;
        bus.publish(EventPayload::RunStarted).await;

        assert!(matches!(a.recv().await.unwrap().payload, EventPayload::RunStarted));
        assert!(matches!(b.recv().await.unwrap().payload, EventPayload::RunStarted));
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_without_blocking_publish() {
        let bus = EventBus::new(RunId::new(), None);
        {
            let _rx = bus.subscribe().await; // immediately dropped
        }
        // Should not panic or hang even though the receiver is gone.
        bus.publish(EventPayload::RunStarted).await;
    }
}

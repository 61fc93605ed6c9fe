// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Maps one run's Event Bus onto a client-facing frame stream: forwards
//! every published event, injects `custom:heartbeat` frames during idle
//! stretches, and retains a resume window for reconnecting clients.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arbiter_events::{CustomEvent, Event, EventBus, EventPayload};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::ring::{EventRing, ResumeOutcome};

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_RING_CAPACITY: usize = 512;
const FRAME_BUFFER: usize = 256;

/// Stream Transport (§4.1, §6.1): owns one subscription to a run's
/// [`EventBus`] and turns it into a forwarding task producing client frames.
pub struct StreamTransport {
    bus: Arc<EventBus>,
    ring: Mutex<EventRing>,
    heartbeat_interval: Duration,
}

impl StreamTransport {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_config(bus, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_RING_CAPACITY)
    }

    pub fn with_config(bus: Arc<EventBus>, heartbeat_interval: Duration, ring_capacity: usize) -> Self {
        Self { bus, ring: Mutex::new(EventRing::new(ring_capacity)), heartbeat_interval }
    }

    /// Subscribe to the bus and start the forwarding/heartbeat loop,
    /// returning the channel the transport layer (HTTP/SSE/WebSocket
    /// handler) reads client frames from. The loop ends once a terminal
    /// event (`run_finished`/`run_error`) has been forwarded or the bus
    /// itself is gone.
    pub async fn stream(self: Arc<Self>) -> mpsc::Receiver<Event> {
        let mut sub = self.bus.subscribe().await;
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);

        tokio::spawn(async move {
            let started = Instant::now();
            let mut heartbeat_count: u64 = 0;

            loop {
                match tokio::time::timeout(self.heartbeat_interval, sub.recv()).await {
                    Ok(Some(event)) => {
                        let terminal = event.is_terminal();
                        self.ring.lock().await.push(event.clone());
                        if tx.send(event).await.is_err() {
                            break;
                        }
                        if terminal {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(_elapsed) => {
                        heartbeat_count += 1;
                        debug!(run_id = %self.bus.run_id(), heartbeat_count, "run idle, emitting heartbeat");
                        self.bus
                            .publish(EventPayload::Custom(CustomEvent::Heartbeat {
                                count: heartbeat_count,
                                elapsed_seconds: started.elapsed().as_secs(),
                                status: "active".into(),
                            }))
                            .await;
                        // The heartbeat arrives back through `sub` on the next
                        // iteration like any other event; it is buffered and
                        // forwarded there, not duplicated here.
                    }
                }
            }
        });

        rx
    }

    /// Answer a reconnecting client's resume request against the retained
    /// window.
    pub async fn resume_from(&self, last_seq: u64) -> ResumeOutcome {
        self.ring.lock().await.resume_from(last_seq)
    }
}

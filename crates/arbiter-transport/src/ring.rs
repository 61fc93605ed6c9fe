// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::VecDeque;

use arbiter_events::Event;

/// What a reconnecting client should do given the last sequence number it
/// saw (§6.1: "the client may acknowledge its last seen sequence to enable
/// resume; if resume is unsupported, reconnection replays from a fresh
/// snapshot").
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    /// Replay these events (possibly empty — the client was already
    /// caught up) and then resume live forwarding.
    Replay(Vec<Event>),
    /// The requested sequence fell outside the retained window; the caller
    /// must fall back to a fresh `state_snapshot` instead of a gapless
    /// replay.
    SnapshotRequired,
}

/// A bounded, append-only window over the most recent events a
/// [`crate::StreamTransport`] has forwarded, used to answer resume requests
/// without re-querying the Event Bus (which does not buffer past events
/// itself).
pub struct EventRing {
    capacity: usize,
    buf: VecDeque<Event>,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, buf: VecDeque::with_capacity(capacity) }
    }

    pub fn push(&mut self, event: Event) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn resume_from(&self, last_seq: u64) -> ResumeOutcome {
        match self.buf.front() {
            None if last_seq == 0 => ResumeOutcome::Replay(Vec::new()),
            None => ResumeOutcome::SnapshotRequired,
            Some(front) if front.seq > last_seq + 1 => ResumeOutcome::SnapshotRequired,
            Some(_) => {
                let missed = self.buf.iter().filter(|e| e.seq > last_seq).cloned().collect();
                ResumeOutcome::Replay(missed)
            }
        }
    }
}

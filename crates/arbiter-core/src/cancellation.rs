// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Cancellation token for an in-flight run: a `watch<bool>` pair so the
//! Agentic Loop can check for cancellation on every iteration without
//! consuming a one-shot signal, and so a cancelled run can be queried
//! after the fact.

use tokio::sync::watch;

/// Handle held by whoever can cancel a run (the HTTP layer, a CLI `Ctrl-C`
/// handler, the Recovery Manager). Cloning shares the same underlying flag.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken { rx: self.tx.subscribe() }
    }
}

/// Handle held by the Agentic Loop to observe cancellation.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is cancelled. Used in `tokio::select!` to race
    /// against an in-flight model call or tool execution.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
    }
}

/// Construct a fresh, un-cancelled handle/token pair for a new run.
pub fn new_pair() -> (CancellationHandle, CancellationToken) {
    let (tx, rx) = watch::channel(false);
    (CancellationHandle { tx }, CancellationToken { rx })
}

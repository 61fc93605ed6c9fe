// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Stream Transport (§4.1, §6.1): maps a run's Event Bus onto a client-facing
//! frame stream, with heartbeat injection and a bounded resume window.

mod frame;
mod ring;
mod stream;

pub use frame::to_json_frame;
pub use ring::{EventRing, ResumeOutcome};
pub use stream::StreamTransport;

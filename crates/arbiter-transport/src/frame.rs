// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use arbiter_events::Event;

/// Serialize one event into the UTF-8 JSON object §6.1 calls a frame. A thin
/// wrapper so callers never reach for `serde_json` directly at the wire
/// boundary.
pub fn to_json_frame(event: &Event) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

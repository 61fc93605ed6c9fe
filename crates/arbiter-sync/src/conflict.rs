// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

/// What to do with a client-originated diff whose believed base version no
/// longer matches the server's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Apply,
    Conflict,
}

/// Decides, per diff, whether a client's optimistic update still applies
/// once the server has moved on. Invoked only when the client's
/// `base_version` has fallen behind the server's current version; a diff
/// submitted against the current version is always applied without
/// consulting a strategy.
pub trait ConflictStrategy: Send + Sync {
    fn resolve(&self, path: &str, server_value: Option<&Value>, client_old_value: Option<&Value>, client_new_value: &Value) -> Resolution;
}

/// Applies the diff if the server's current value at `path` still matches
/// what the client last observed there; otherwise the later write (the
/// server's, since it landed first) wins and the diff is reported as a
/// conflict.
pub struct LastWriteWins;

impl ConflictStrategy for LastWriteWins {
    fn resolve(
        &self,
        _path: &str,
        server_value: Option<&Value>,
        client_old_value: Option<&Value>,
        _client_new_value: &Value,
    ) -> Resolution {
        if server_value == client_old_value {
            Resolution::Apply
        } else {
            Resolution::Conflict
        }
    }
}

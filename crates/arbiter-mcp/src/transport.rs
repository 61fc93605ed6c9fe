// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::McpError;

/// One RPC shape, two carriers (stdio child process / HTTPS POST). Each
/// implementor owns its own request id allocation and response correlation.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, McpError>;

    async fn close(&self);

    /// Lightweight liveness probe used by the Manager's periodic health
    /// check. The default issues a harmless `tools/list` call, which works
    /// over any transport; `http` overrides this with the dedicated
    /// `/health` endpoint.
    async fn health_check(&self) -> bool {
        self.call("tools/list", json!({})).await.is_ok()
    }
}

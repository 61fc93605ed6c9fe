// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! http transport: JSON-RPC bodies over authenticated HTTPS POST, with
//! `GET /health` as the dedicated liveness probe.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpError;
use crate::rpc::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::McpTransport;

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into(), next_id: AtomicU64::new(1) }
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);
        let resp = self
            .client
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| McpError::Connection(e.to_string()))?;
        let body: JsonRpcResponse =
            resp.json().await.map_err(|e| McpError::Protocol(format!("decode response: {e}")))?;
        match body.error {
            Some(e) => Err(McpError::Rpc { code: e.code, message: e.message }),
            None => Ok(body.result.unwrap_or(Value::Null)),
        }
    }

    async fn close(&self) {}

    async fn health_check(&self) -> bool {
        match self.client.get(self.health_url()).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

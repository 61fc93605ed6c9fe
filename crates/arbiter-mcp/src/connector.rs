// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::error::McpError;
use crate::transport::McpTransport;

const PROTOCOL_VERSION: &str = "2024-11-05";
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// One tool advertised by an MCP server's `tools/list` response.
#[derive(Debug, Clone)]
pub struct McpToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A live connection to one MCP server (§4.7). Owns the transport and the
/// server's advertised tool list; unaware of any other server the Manager
/// also holds.
pub struct McpConnector {
    server_name: String,
    transport: Box<dyn McpTransport>,
    tools: RwLock<Vec<McpToolDescriptor>>,
    healthy: AtomicBool,
    tool_timeout: Duration,
}

impl McpConnector {
    pub fn new(server_name: impl Into<String>, transport: Box<dyn McpTransport>) -> Self {
        Self {
            server_name: server_name.into(),
            transport,
            tools: RwLock::new(Vec::new()),
            healthy: AtomicBool::new(false),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// `initialize` handshake followed by an initial `tools/list`.
    pub async fn connect(&self) -> Result<(), McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {"name": "arbiter", "version": env!("CARGO_PKG_VERSION")},
        });
        let result = self.transport.call("initialize", params).await?;
        result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::Protocol("initialize response missing protocolVersion".into()))?;

        self.refresh_tools().await?;
        self.healthy.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.transport.close().await;
        self.healthy.store(false, Ordering::Relaxed);
    }

    pub async fn refresh_tools(&self) -> Result<(), McpError> {
        let result = self.transport.call("tools/list", json!({})).await?;
        let raw = result.get("tools").and_then(Value::as_array).cloned().unwrap_or_default();
        let descriptors = raw
            .into_iter()
            .filter_map(|t| {
                let name = t.get("name")?.as_str()?.to_string();
                let description =
                    t.get("description").and_then(Value::as_str).unwrap_or_default().to_string();
                let input_schema =
                    t.get("inputSchema").cloned().unwrap_or_else(|| json!({"type": "object"}));
                Some(McpToolDescriptor { name, description, input_schema })
            })
            .collect();
        *self.tools.write().await = descriptors;
        Ok(())
    }

    /// Tools currently known for this server. Empty while the server is
    /// marked unhealthy, so an aggregate tool index built on top of several
    /// connectors naturally excludes an unreachable server's tools.
    pub async fn list_tools(&self) -> Vec<McpToolDescriptor> {
        if !self.is_healthy() {
            return Vec::new();
        }
        self.tools.read().await.clone()
    }

    pub async fn execute_tool(&self, name: &str, args: Value) -> Result<String, McpError> {
        let params = json!({"name": name, "arguments": args});
        match timeout(self.tool_timeout, self.transport.call("tools/call", params)).await {
            Ok(Ok(result)) => Ok(extract_text_content(&result)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(McpError::Timeout(name.to_string())),
        }
    }

    /// Re-run the liveness probe and update `is_healthy` accordingly.
    pub async fn health_check(&self) -> bool {
        let ok = self.transport.health_check().await;
        self.healthy.store(ok, Ordering::Relaxed);
        ok
    }
}

/// Concatenate only `type == "text"` content items; other content types are
/// dropped rather than erroring.
fn extract_text_content(result: &Value) -> String {
    result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

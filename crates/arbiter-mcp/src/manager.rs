// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Owns every connected MCP server, keyed by name, and maintains an
//! aggregate `name → server` tool index on top of them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arbiter_config::McpServerConfig;
use arbiter_metrics::RunMetrics;
use arbiter_tools::ToolRegistry;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::connector::McpConnector;
use crate::error::McpError;
use crate::http::HttpTransport;
use crate::stdio::StdioTransport;
use crate::tool_adapter::McpToolAdapter;
use crate::transport::McpTransport;

const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

pub struct McpManager {
    connectors: RwLock<HashMap<String, Arc<McpConnector>>>,
    metrics: Option<Arc<RunMetrics>>,
    health_check_interval: Duration,
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}

impl McpManager {
    pub fn new() -> Self {
        Self {
            connectors: RwLock::new(HashMap::new()),
            metrics: None,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RunMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn transport_for(config: &McpServerConfig) -> Result<Box<dyn McpTransport>, McpError> {
        match config {
            McpServerConfig::Stdio { command, args } => {
                Ok(Box::new(StdioTransport::spawn(command, args)?))
            }
            McpServerConfig::Http { url } => Ok(Box::new(HttpTransport::new(url.clone()))),
        }
    }

    pub async fn connect_server(&self, name: &str, config: &McpServerConfig) -> Result<(), McpError> {
        let transport = Self::transport_for(config)?;
        let connector = Arc::new(McpConnector::new(name, transport));
        match connector.connect().await {
            Ok(()) => {
                if let Some(m) = &self.metrics {
                    m.record_mcp_connection_opened();
                }
                self.connectors.write().await.insert(name.to_string(), connector);
                Ok(())
            }
            Err(e) => {
                if let Some(m) = &self.metrics {
                    m.record_mcp_connection_error();
                }
                Err(e)
            }
        }
    }

    pub async fn disconnect_server(&self, name: &str) {
        if let Some(connector) = self.connectors.write().await.remove(name) {
            connector.disconnect().await;
            if let Some(m) = &self.metrics {
                m.record_mcp_connection_closed();
            }
        }
    }

    pub async fn is_connected(&self, name: &str) -> bool {
        self.connectors.read().await.contains_key(name)
    }

    /// Execute `<server>:<tool>` against whichever connector owns it.
    pub async fn execute_tool(&self, qualified_name: &str, args: Value) -> Result<String, McpError> {
        let (server, tool) = qualified_name
            .split_once(':')
            .ok_or_else(|| McpError::UnknownTool(qualified_name.to_string()))?;
        let connector = self
            .connectors
            .read()
            .await
            .get(server)
            .cloned()
            .ok_or_else(|| McpError::UnknownServer(server.to_string()))?;
        connector.execute_tool(tool, args).await
    }

    /// Register every currently-known tool from every connected (and
    /// healthy) server into `registry` under its qualified name.
    pub async fn register_into(&self, registry: &mut ToolRegistry) {
        let connectors: Vec<Arc<McpConnector>> = self.connectors.read().await.values().cloned().collect();
        for connector in connectors {
            for descriptor in connector.list_tools().await {
                let server = connector.server_name().to_string();
                registry.register(McpToolAdapter::new(&server, descriptor, connector.clone()));
            }
        }
    }

    async fn run_health_checks(&self) {
        let connectors: Vec<Arc<McpConnector>> = self.connectors.read().await.values().cloned().collect();
        for connector in connectors {
            if !connector.health_check().await {
                warn!(server = connector.server_name(), "MCP server failed health check");
            }
        }
    }

    /// Spawn the periodic health-check loop. The returned handle is aborted
    /// when dropped; callers keep it alive for the process lifetime.
    pub fn spawn_health_checks(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.health_check_interval);
            loop {
                interval.tick().await;
                this.run_health_checks().await;
            }
        })
    }
}

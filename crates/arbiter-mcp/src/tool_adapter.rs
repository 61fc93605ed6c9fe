// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Adapts a discovered MCP tool into the Tool Registry's `Tool` trait so
//! MCP-sourced tools are indistinguishable from built-ins to the Agentic
//! Loop, save for their qualified `<server>:<tool>` name.

use std::sync::Arc;

use arbiter_tools::{ApprovalPolicy, OutputCategory, Tool, ToolCall, ToolOutput};
use async_trait::async_trait;
use serde_json::Value;

use crate::connector::{McpConnector, McpToolDescriptor};

pub struct McpToolAdapter {
    qualified_name: String,
    tool_name: String,
    description: String,
    schema: Value,
    connector: Arc<McpConnector>,
}

impl McpToolAdapter {
    pub fn new(server: &str, descriptor: McpToolDescriptor, connector: Arc<McpConnector>) -> Self {
        Self {
            qualified_name: format!("{server}:{}", descriptor.name),
            tool_name: descriptor.name,
            description: descriptor.description,
            schema: descriptor.input_schema,
            connector,
        }
    }
}

#[async_trait]
impl Tool for McpToolAdapter {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    /// MCP tools run on a server the operator chose to connect, but their
    /// side effects are out of process — default to asking, same as the
    /// built-in exec/write tools.
    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.connector.execute_tool(&self.tool_name, call.args.clone()).await {
            Ok(text) => ToolOutput::ok(call.id.clone(), text),
            Err(e) => ToolOutput::err(call.id.clone(), e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpTransport;

    #[test]
    fn qualified_name_prefixes_server() {
        let connector = Arc::new(McpConnector::new("fs", Box::new(HttpTransport::new("http://x"))));
        let descriptor = McpToolDescriptor {
            name: "read_file".into(),
            description: "Reads a file".into(),
            input_schema: serde_json::json!({"type": "object"}),
        };
        let adapter = McpToolAdapter::new("fs", descriptor, connector);
        assert_eq!(adapter.name(), "fs:read_file");
        assert_eq!(adapter.default_policy(), ApprovalPolicy::Ask);
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use arbiter_events::RunErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to connect to MCP server: {0}")]
    Connection(String),
    #[error("MCP protocol error: {0}")]
    Protocol(String),
    #[error("MCP server returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("tool call '{0}' timed out")]
    Timeout(String),
    #[error("unknown MCP server: {0}")]
    UnknownServer(String),
    #[error("unknown MCP tool: {0}")]
    UnknownTool(String),
}

impl From<&McpError> for RunErrorKind {
    fn from(e: &McpError) -> Self {
        match e {
            McpError::Connection(_) | McpError::Protocol(_) | McpError::UnknownServer(_) => {
                RunErrorKind::McpConnection
            }
            McpError::Rpc { .. } | McpError::UnknownTool(_) => RunErrorKind::McpTool,
            McpError::Timeout(_) => RunErrorKind::McpTimeout,
        }
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! MCP Connector (§4.7): stdio and HTTP JSON-RPC clients for external
//! tool-providing servers, plus a Manager aggregating several of them into
//! one qualified (`<server>:<tool>`) tool index.

mod connector;
mod error;
mod http;
mod manager;
mod rpc;
mod stdio;
mod tool_adapter;
mod transport;

pub use connector::{McpConnector, McpToolDescriptor};
pub use error::McpError;
pub use http::HttpTransport;
pub use manager::McpManager;
pub use rpc::{JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse};
pub use stdio::StdioTransport;
pub use tool_adapter::McpToolAdapter;
pub use transport::McpTransport;

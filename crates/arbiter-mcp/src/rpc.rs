// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Wire types for the JSON-RPC 2.0 envelope MCP servers speak, whether
//! carried over newline-delimited stdio or an HTTPS POST body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: "2.0", id, method: method.into(), params }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_protocol_version() {
        let req = JsonRpcRequest::new(1, "tools/list", serde_json::json!({}));
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["jsonrpc"], "2.0");
        assert_eq!(v["method"], "tools/list");
    }

    #[test]
    fn response_without_id_is_accepted() {
        let resp: JsonRpcResponse = serde_json::from_str(r#"{"result":{"ok":true}}"#).unwrap();
        assert!(resp.id.is_none());
        assert_eq!(resp.result.unwrap()["ok"], true);
    }

    #[test]
    fn response_error_parses() {
        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"id":2,"error":{"code":-32601,"message":"not found"}}"#)
                .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "not found");
    }
}

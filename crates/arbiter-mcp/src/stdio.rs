// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! stdio transport: a child process speaking newline-delimited JSON-RPC 2.0
//! on its stdin/stdout. A single background task owns stdout and correlates
//! responses back to waiting callers by request id; a mutex-guarded stdin
//! enforces the single-writer side.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::McpError;
use crate::rpc::JsonRpcRequest;
use crate::transport::McpTransport;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, McpError>>>>>;

pub struct StdioTransport {
    stdin: Mutex<ChildStdin>,
    pending: Pending,
    next_id: AtomicU64,
    child: Mutex<Child>,
    reader: JoinHandle<()>,
}

impl StdioTransport {
    /// Spawn `command args...` and start reading its stdout.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, McpError> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::Connection(format!("spawn {command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Connection("child stdin not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Connection("child stdout not piped".into()))?;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_loop(stdout, pending.clone()));

        Ok(Self {
            stdin: Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            child: Mutex::new(child),
            reader,
        })
    }
}

async fn read_loop(stdout: tokio::process::ChildStdout, pending: Pending) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<crate::rpc::JsonRpcResponse>(&line) {
                    Ok(resp) => {
                        let Some(id) = resp.id else { continue };
                        if let Some(tx) = pending.lock().await.remove(&id) {
                            let outcome = match resp.error {
                                Some(e) => Err(McpError::Rpc { code: e.code, message: e.message }),
                                None => Ok(resp.result.unwrap_or(Value::Null)),
                            };
                            let _ = tx.send(outcome);
                        }
                    }
                    Err(e) => warn!(error = %e, line, "malformed MCP response line"),
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(McpError::Connection("server closed stdout".into())));
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let req = JsonRpcRequest::new(id, method, params);
        let mut line = serde_json::to_string(&req)
            .map_err(|e| McpError::Protocol(format!("encode request: {e}")))?;
        line.push('\n');

        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                self.pending.lock().await.remove(&id);
                return Err(McpError::Connection(format!("write to child stdin: {e}")));
            }
            if let Err(e) = stdin.flush().await {
                self.pending.lock().await.remove(&id);
                return Err(McpError::Connection(format!("flush child stdin: {e}")));
            }
        }

        rx.await.map_err(|_| McpError::Connection("reader task ended before response".into()))?
    }

    async fn close(&self) {
        self.reader.abort();
        let mut child = self.child.lock().await;
        let _ = child.kill().await;
    }
}

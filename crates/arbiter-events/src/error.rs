use serde::{Deserialize, Serialize};

/// The error taxonomy carried on `run_error` events.
///
/// Crate-local error enums (`SessionError`, `ToolError`, `McpError`, ...)
/// convert into this one via `From` impls at the point where a run-scoped
/// failure is about to terminate a run, so no layer re-stringifies a `kind`
/// by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    // Session
    NotFound,
    AlreadyExists,
    InvalidState,
    Expired,
    // Message / tool
    MessageTooLong,
    ToolNotFound,
    InvalidToolArgs,
    ToolExecutionFailed,
    ToolTimeout,
    // Approval
    ApprovalTimeout,
    ApprovalRejected,
    // LLM
    LlmUnavailable,
    LlmTimeout,
    RateLimited,
    TokenLimit,
    // MCP
    McpConnection,
    McpTool,
    McpTimeout,
    // Stream
    StreamOverflow,
    // Loop-scoped
    RejectedByHook,
    Timeout,
    Cancelled,
    MaxTurns,
    // Generic
    Validation,
    Internal,
    Database,
    Cache,
}

impl std::fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "internal".to_string());
        write!(f, "{s}")
    }
}

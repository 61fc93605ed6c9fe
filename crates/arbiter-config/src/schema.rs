// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Top-level orchestrator configuration (§6.5), loaded by [`crate::load`] and
/// shared by every component that needs a tunable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Named MCP server connections this orchestrator can reach.
    #[serde(default)]
    pub mcp_servers: std::collections::HashMap<String, McpServerConfig>,
    /// Named provider configurations, selectable by key at run time.
    #[serde(default)]
    pub providers: std::collections::HashMap<String, ModelConfig>,
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier passed to the injected [`arbiter_model::ModelProvider`].
    pub provider: String,
    /// Model name forwarded to the provider.
    pub name: String,
    /// Environment variable that holds the API key (read at runtime).
    pub api_key_env: Option<String>,
    /// Base URL override, for local proxies or self-hosted endpoints.
    pub base_url: Option<String>,
    /// Maximum output tokens requested per completion.
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0-2.0).
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "echo".into(),
            name: "echo-model".into(),
            api_key_env: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
        }
    }
}

fn default_max_turns() -> u32 {
    200
}
fn default_compaction_threshold() -> f32 {
    0.85
}
fn default_compaction_keep_recent() -> usize {
    6
}
fn default_tool_result_token_cap() -> usize {
    4000
}
fn default_compaction_overhead_reserve() -> f32 {
    0.10
}

/// Strategy used when compacting a session's context window (§4.3).
///
/// `Structured` (default) instructs the model to produce a typed checkpoint
/// with fixed sections; `Narrative` uses a free-form summarisation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompactionStrategy {
    #[default]
    Structured,
    Narrative,
}

impl std::fmt::Display for CompactionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompactionStrategy::Structured => write!(f, "structured"),
            CompactionStrategy::Narrative => write!(f, "narrative"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of loop iterations (one per model round-trip) before
    /// a run terminates with `run_error(kind=max_turns)`.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Token fraction of the usable input budget at which proactive
    /// compaction triggers.
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: f32,
    /// Number of recent non-system messages preserved verbatim during
    /// compaction; older messages are summarised.
    #[serde(default = "default_compaction_keep_recent")]
    pub compaction_keep_recent: usize,
    #[serde(default)]
    pub compaction_strategy: CompactionStrategy,
    /// Maximum tokens allowed for a single tool result before deterministic,
    /// category-aware truncation. 0 disables per-result truncation.
    #[serde(default = "default_tool_result_token_cap")]
    pub tool_result_token_cap: usize,
    /// Fraction of the context window reserved for tool schemas and dynamic
    /// context, subtracted from the effective compaction trigger threshold.
    #[serde(default = "default_compaction_overhead_reserve")]
    pub compaction_overhead_reserve: f32,
    /// System prompt override; `None` uses the built-in default.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            compaction_threshold: default_compaction_threshold(),
            compaction_keep_recent: default_compaction_keep_recent(),
            compaction_strategy: CompactionStrategy::Structured,
            tool_result_token_cap: default_tool_result_token_cap(),
            compaction_overhead_reserve: default_compaction_overhead_reserve(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Glob patterns auto-approved without a human-in-the-loop prompt.
    pub auto_approve_patterns: Vec<String>,
    /// Glob patterns rejected outright, even before an approval is asked.
    pub deny_patterns: Vec<String>,
    /// Timeout in seconds for a single tool call.
    pub timeout_secs: u64,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub shell: ShellConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            auto_approve_patterns: vec!["cat *".into(), "ls *".into(), "grep *".into()],
            deny_patterns: vec!["rm -rf /*".into(), "dd if=*".into()],
            timeout_secs: 30,
            web: WebConfig::default(),
            shell: ShellConfig::default(),
        }
    }
}

/// Command gating for the `shell` tool (§4.2).
///
/// `deny_substrings` is checked first and always wins. When `allow_substrings`
/// is non-empty the command must also match at least one entry, turning the
/// tool from deny-list-only into an explicit allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Substrings that reject a command outright (e.g. "rm -rf /", ":(){ :|:& };:").
    pub deny_substrings: Vec<String>,
    /// When non-empty, a command must contain at least one of these substrings
    /// to run. Empty means any command not denied is allowed.
    pub allow_substrings: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            deny_substrings: vec![
                "rm -rf /".into(),
                "mkfs".into(),
                ":(){ :|:& };:".into(),
            ],
            allow_substrings: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Default maximum characters for web_fetch output.
    pub fetch_max_chars: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { fetch_max_chars: 50_000 }
    }
}

fn default_approval_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Seconds a pending approval waits before expiring (§4.2).
    #[serde(default = "default_approval_timeout_secs")]
    pub default_timeout_secs: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self { default_timeout_secs: default_approval_timeout_secs() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// One MCP server this orchestrator may connect to (§4.7, §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum McpServerConfig {
    Stdio { command: String, #[serde(default)] args: Vec<String> },
    Http { url: String },
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_model_provider_is_echo() {
        let c = Config::default();
        assert_eq!(c.model.provider, "echo");
    }

    #[test]
    fn config_default_max_turns_positive() {
        let c = Config::default();
        assert!(c.agent.max_turns > 0);
    }

    #[test]
    fn config_default_compaction_threshold_in_range() {
        let c = Config::default();
        assert!(c.agent.compaction_threshold > 0.0 && c.agent.compaction_threshold < 1.0);
    }

    #[test]
    fn config_default_compaction_keep_recent_is_six() {
        assert_eq!(Config::default().agent.compaction_keep_recent, 6);
    }

    #[test]
    fn config_compaction_keep_recent_yaml_round_trip() {
        let yaml_str = "agent:\n  compaction_keep_recent: 10\n";
        let c: Config = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(c.agent.compaction_keep_recent, 10);
        let back_yaml = serde_yaml::to_string(&c).unwrap();
        let back: Config = serde_yaml::from_str(&back_yaml).unwrap();
        assert_eq!(back.agent.compaction_keep_recent, 10);
    }

    #[test]
    fn config_compaction_keep_recent_defaults_when_absent_from_yaml() {
        let yaml_str = "agent:\n  max_turns: 30\n  compaction_threshold: 0.9\n";
        let c: Config = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(c.agent.compaction_keep_recent, 6);
    }

    #[test]
    fn config_default_no_system_prompt_override() {
        assert!(Config::default().agent.system_prompt.is_none());
    }

    #[test]
    fn config_default_tools_has_auto_approve_patterns() {
        assert!(!Config::default().tools.auto_approve_patterns.is_empty());
    }

    #[test]
    fn config_default_approval_timeout_is_five_minutes() {
        assert_eq!(Config::default().approval.default_timeout_secs, 300);
    }

    #[test]
    fn config_default_metrics_enabled() {
        assert!(Config::default().metrics.enabled);
    }

    #[test]
    fn config_default_log_level_is_info() {
        assert_eq!(Config::default().log_level, "info");
    }

    #[test]
    fn config_serialises_to_valid_yaml() {
        let yaml_str = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml_str.contains("provider"));
    }

    #[test]
    fn config_deserialises_from_yaml() {
        let yaml_str = "model:\n  provider: anthropic\n  name: claude-opus\n  max_tokens: 8192\n";
        let c: Config = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(c.model.provider, "anthropic");
        assert_eq!(c.model.max_tokens, Some(8192));
    }

    #[test]
    fn config_partial_yaml_fills_in_defaults() {
        let yaml_str = "model:\n  name: x\n  provider: openai\n";
        let c: Config = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(c.agent.max_turns, AgentConfig::default().max_turns);
    }

    #[test]
    fn config_default_providers_and_mcp_servers_empty() {
        let c = Config::default();
        assert!(c.providers.is_empty());
        assert!(c.mcp_servers.is_empty());
    }

    #[test]
    fn mcp_server_stdio_round_trips_through_yaml() {
        let yaml = "mcp_servers:\n  fs:\n    transport: stdio\n    command: mcp-fs\n    args: [\"--root\", \".\"]\n";
        let c: Config = serde_yaml::from_str(yaml).unwrap();
        match c.mcp_servers.get("fs").unwrap() {
            McpServerConfig::Stdio { command, args } => {
                assert_eq!(command, "mcp-fs");
                assert_eq!(args, &vec!["--root".to_string(), ".".to_string()]);
            }
            McpServerConfig::Http { .. } => panic!("wrong variant"),
        }
    }

    #[test]
    fn mcp_server_http_round_trips_through_yaml() {
        let yaml = "mcp_servers:\n  remote:\n    transport: http\n    url: http://localhost:9000\n";
        let c: Config = serde_yaml::from_str(yaml).unwrap();
        match c.mcp_servers.get("remote").unwrap() {
            McpServerConfig::Http { url } => assert_eq!(url, "http://localhost:9000"),
            McpServerConfig::Stdio { .. } => panic!("wrong variant"),
        }
    }

    #[test]
    fn compaction_strategy_default_is_structured() {
        assert_eq!(CompactionStrategy::default(), CompactionStrategy::Structured);
    }

    #[test]
    fn compaction_strategy_display() {
        assert_eq!(CompactionStrategy::Structured.to_string(), "structured");
        assert_eq!(CompactionStrategy::Narrative.to_string(), "narrative");
    }
}

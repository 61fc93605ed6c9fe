// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use arbiter_events::SessionId;
use async_trait::async_trait;
use regex::Regex;

use crate::hook::{Hook, HookOutcome, ToolCallRequest};

/// Argument keys the Sandbox hook treats as filesystem paths.
const PATH_ARG_KEYS: &[&str] = &["path", "file_path", "dir"];

#[derive(Debug, Clone, Default)]
pub struct SandboxConfig {
    /// Roots a file-tool path must fall under. Empty means unrestricted.
    pub allowed_roots: Vec<PathBuf>,
    /// Glob patterns (see [`glob_to_regex`]) that always reject a match.
    pub deny_globs: Vec<String>,
}

/// Rejects file-tool calls whose path escapes the allow-listed roots or
/// matches a deny-glob. Non-file tools (no recognized path argument) always
/// `Allow`.
pub struct SandboxHook {
    allowed_roots: Vec<PathBuf>,
    deny_patterns: Vec<Regex>,
}

impl SandboxHook {
    pub fn new(config: SandboxConfig) -> Self {
        let deny_patterns = config.deny_globs.iter().filter_map(|p| glob_to_regex(p)).collect();
        Self { allowed_roots: config.allowed_roots, deny_patterns }
    }

    fn extract_path(call: &ToolCallRequest) -> Option<String> {
        PATH_ARG_KEYS
            .iter()
            .find_map(|key| call.args.get(key).and_then(|v| v.as_str()).map(str::to_string))
    }

    fn is_within_allowed_roots(&self, path: &Path) -> bool {
        if self.allowed_roots.is_empty() {
            return true;
        }
        self.allowed_roots.iter().any(|root| path.starts_with(root))
    }
}

#[async_trait]
impl Hook for SandboxHook {
    fn name(&self) -> &str {
        "sandbox"
    }

    fn priority(&self) -> i32 {
        85
    }

    async fn on_tool_call(&self, _session_id: SessionId, call: &ToolCallRequest) -> HookOutcome {
        let Some(path_str) = Self::extract_path(call) else {
            return HookOutcome::Allow;
        };

        for re in &self.deny_patterns {
            if re.is_match(&path_str) {
                return HookOutcome::Reject(format!("path '{path_str}' matches a denied pattern"));
            }
        }

        let path = Path::new(&path_str);
        if !self.is_within_allowed_roots(path) {
            return HookOutcome::Reject(format!("path '{path_str}' escapes the allowed roots"));
        }

        HookOutcome::Allow
    }
}

/// Convert a simple shell glob pattern to a [`Regex`]. Only `*` (match
/// anything) and `?` (match one char) are supported.
pub fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => {
                for esc in regex::escape(&c.to_string()).chars() {
                    re.push(esc);
                }
            }
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// One exact-match replacement within a `multi_edit` call.
struct Edit {
    old_string: String,
    new_string: String,
    replace_all: bool,
}

fn parse_edits(raw: &Value) -> Result<Vec<Edit>, String> {
    let arr = raw.as_array().ok_or("'edits' must be an array")?;
    if arr.is_empty() {
        return Err("'edits' must contain at least one entry".to_string());
    }
    arr.iter()
        .enumerate()
        .map(|(i, e)| {
            let old_string = e
                .get("old_string")
                .and_then(|v| v.as_str())
                .ok_or_else(|| format!("edits[{i}]: missing 'old_string'"))?
                .to_string();
            let new_string = e
                .get("new_string")
                .and_then(|v| v.as_str())
                .ok_or_else(|| format!("edits[{i}]: missing 'new_string'"))?
                .to_string();
            if old_string == new_string {
                return Err(format!("edits[{i}]: old_string and new_string are identical"));
            }
            let replace_all = e.get("replace_all").and_then(|v| v.as_bool()).unwrap_or(false);
            Ok(Edit { old_string, new_string, replace_all })
        })
        .collect()
}

/// Apply `edit` to `content`. Fails if `old_string` is missing, or ambiguous
/// (multiple occurrences) unless `replace_all` is set.
fn apply_edit(content: &str, edit: &Edit, index: usize) -> Result<String, String> {
    let occurrences = content.matches(edit.old_string.as_str()).count();
    if occurrences == 0 {
        return Err(format!("edits[{index}]: old_string not found in file"));
    }
    if occurrences > 1 && !edit.replace_all {
        return Err(format!(
            "edits[{index}]: old_string matches {occurrences} locations; \
             set replace_all=true or narrow old_string to a unique match"
        ));
    }
    if edit.replace_all {
        Ok(content.replace(&edit.old_string, &edit.new_string))
    } else {
        Ok(content.replacen(&edit.old_string, &edit.new_string, 1))
    }
}

/// Built-in tool that applies a sequence of exact-match string replacements
/// to a single file as one atomic operation — all edits apply in order
/// against an in-memory buffer, and the file is only written if every edit
/// succeeds.
pub struct MultiEditTool;

#[async_trait]
impl Tool for MultiEditTool {
    fn name(&self) -> &str {
        "multi_edit"
    }

    fn description(&self) -> &str {
        "Apply multiple exact-match string replacements to a single file as one atomic \
         operation. Each entry in 'edits' has old_string/new_string and an optional \
         replace_all flag (default false — fails if old_string is ambiguous). Edits are \
         applied in order against an in-memory copy; the file is only written once every \
         edit succeeds, so a failing edit leaves the file untouched. \
         Prefer edit_file for diff-style hunks; use multi_edit when making several \
         unrelated exact replacements in one file in a single call."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file to edit"
                },
                "edits": {
                    "type": "array",
                    "description": "Ordered list of replacements to apply",
                    "items": {
                        "type": "object",
                        "properties": {
                            "old_string": { "type": "string" },
                            "new_string": { "type": "string" },
                            "replace_all": {
                                "type": "boolean",
                                "description": "Replace every occurrence instead of requiring a unique match"
                            }
                        },
                        "required": ["old_string", "new_string"]
                    }
                }
            },
            "required": ["path", "edits"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => return ToolOutput::err(&call.id, "Missing required parameter: path"),
        };
        let edits = match call.args.get("edits") {
            Some(raw) => match parse_edits(raw) {
                Ok(e) => e,
                Err(e) => return ToolOutput::err(&call.id, e),
            },
            None => return ToolOutput::err(&call.id, "Missing required parameter: edits"),
        };

        debug!(path = %path, count = edits.len(), "multi_edit tool");

        let mut content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
        };

        for (i, edit) in edits.iter().enumerate() {
            match apply_edit(&content, edit, i) {
                Ok(updated) => content = updated,
                Err(e) => return ToolOutput::err(&call.id, e),
            }
        }

        match tokio::fs::write(&path, &content).await {
            Ok(_) => ToolOutput::ok(&call.id, format!("applied {} edits to {path}", edits.len())),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tool::{Tool, ToolCall};

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "m1".into(), name: "multi_edit".into(), args }
    }

    fn tmp_file(content: &str) -> String {
        use std::sync::atomic::{AtomicU32, Ordering};
        static CTR: AtomicU32 = AtomicU32::new(0);
        let n = CTR.fetch_add(1, Ordering::Relaxed);
        let path = format!("/tmp/arbiter_multi_edit_test_{}_{n}.txt", std::process::id());
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn missing_path_is_error() {
        let t = MultiEditTool;
        let out = t.execute(&call(json!({"edits": []}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("path"));
    }

    #[tokio::test]
    async fn missing_edits_is_error() {
        let t = MultiEditTool;
        let out = t.execute(&call(json!({"path": "/tmp/x"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("edits"));
    }

    #[tokio::test]
    async fn empty_edits_array_is_error() {
        let path = tmp_file("hello\n");
        let t = MultiEditTool;
        let out = t.execute(&call(json!({"path": path, "edits": []}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("at least one"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn applies_multiple_edits_in_order() {
        let path = tmp_file("alpha\nbeta\ngamma\n");
        let t = MultiEditTool;
        let out = t
            .execute(&call(json!({
                "path": path,
                "edits": [
                    {"old_string": "alpha", "new_string": "ALPHA"},
                    {"old_string": "gamma", "new_string": "GAMMA"}
                ]
            })))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ALPHA\nbeta\nGAMMA\n");
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn ambiguous_match_without_replace_all_fails() {
        let path = tmp_file("dup\ndup\n");
        let t = MultiEditTool;
        let out = t
            .execute(&call(json!({
                "path": path,
                "edits": [{"old_string": "dup", "new_string": "x"}]
            })))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("ambiguous") || out.content.contains("unique"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn replace_all_handles_ambiguous_match() {
        let path = tmp_file("dup\ndup\n");
        let t = MultiEditTool;
        let out = t
            .execute(&call(json!({
                "path": path,
                "edits": [{"old_string": "dup", "new_string": "x", "replace_all": true}]
            })))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x\nx\n");
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn failing_edit_leaves_file_unchanged() {
        let original = "one\ntwo\n";
        let path = tmp_file(original);
        let t = MultiEditTool;
        let out = t
            .execute(&call(json!({
                "path": path,
                "edits": [
                    {"old_string": "one", "new_string": "ONE"},
                    {"old_string": "does_not_exist", "new_string": "x"}
                ]
            })))
            .await;
        assert!(out.is_error);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original, "file should be unchanged");
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn identical_old_and_new_is_error() {
        let path = tmp_file("same\n");
        let t = MultiEditTool;
        let out = t
            .execute(&call(json!({
                "path": path,
                "edits": [{"old_string": "same", "new_string": "same"}]
            })))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("identical"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn nonexistent_file_is_read_error() {
        let t = MultiEditTool;
        let out = t
            .execute(&call(json!({
                "path": "/tmp/arbiter_no_such_file_xyz.txt",
                "edits": [{"old_string": "a", "new_string": "b"}]
            })))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("read error"));
    }

    #[test]
    fn schema_requires_path_and_edits() {
        let t = MultiEditTool;
        let schema = t.parameters_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v.as_str() == Some("path")));
        assert!(required.iter().any(|v| v.as_str() == Some("edits")));
    }
}

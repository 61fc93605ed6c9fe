// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! System-prompt composition for the Agentic Loop (§4.3 step 3).
use chrono::Local;
use std::path::Path;

/// Contextual blocks that can be injected into the system prompt. Held
/// separately from the loop's other state since it is assembled once per
/// turn and is cheap to build fresh.
#[derive(Debug, Default)]
pub struct PromptContext<'a> {
    pub project_root: Option<&'a Path>,
    /// Contents of a project instructions file (e.g. `AGENTS.md`), injected
    /// verbatim as an authoritative section.
    pub project_context_file: Option<&'a str>,
    /// Text appended verbatim after the guidelines section.
    pub append: Option<&'a str>,
    /// When set, this turn is a workflow step rather than a full chat turn;
    /// the prompt is scoped to that step's label instead of the general
    /// agent identity block.
    pub workflow_step: Option<&'a str>,
}

mod guidelines {
    pub fn general() -> &'static str {
        "- Be concise and precise. Use tools instead of guessing.\n\
         - Prefer the most specific tool for a job over a generic shell command."
    }

    pub fn tool_usage() -> &'static str {
        "- Discovery workflow: search the codebase to find files, then read the specific \
           ranges you need.\n\
         - Tool results that exceed the context budget are truncated with an explicit \
           marker; re-issue a narrower call rather than assuming truncated content is absent.\n\
         - Tools gated behind approval may take noticeably longer to return while a human \
           reviews the request."
    }

    pub fn code_quality() -> &'static str {
        "- Preserve existing code structure and style where you edit.\n\
         - Do not create new files unless the task requires them."
    }

    pub fn error_handling() -> &'static str {
        "- When a tool call fails, read the error and try a different approach rather than \
           repeating the same call.\n\
         - A rejected tool call means a human or policy declined it; do not retry it \
           unmodified."
    }
}

fn build_guidelines_section() -> String {
    format!(
        "## Guidelines\n\n{}\n\n{}\n\n{}\n\n{}",
        guidelines::general(),
        guidelines::tool_usage(),
        guidelines::code_quality(),
        guidelines::error_handling(),
    )
}

/// Compose the system prompt for one Agentic Loop turn.
///
/// `custom` overrides the built-in identity/guidelines blocks entirely
/// (honouring `ctx.append` on top), matching [`arbiter_config::AgentConfig::
/// system_prompt`].
pub fn system_prompt(custom: Option<&str>, ctx: PromptContext<'_>) -> String {
    if let Some(custom) = custom {
        return match ctx.append {
            Some(extra) => format!("{}\n\n{extra}", custom.trim_end()),
            None => custom.to_string(),
        };
    }

    let identity = if let Some(step) = ctx.workflow_step {
        format!(
            "You are an orchestration agent executing one step of a multi-step workflow.\n\n\
             Current step: `{step}`\n\n\
             Current date and time: `{now}`\n\n\
             Complete only this step's objective; a separate step will follow if more work \
             remains. Stay within the tools made available to this step.",
            now = Local::now().format("%Y-%m-%d %H:%M:%S"),
        )
    } else {
        format!(
            "You are an agentic session orchestrator: a coding and task-execution assistant \
             with access to a registry of tools, each requiring explicit approval where \
             configured.\n\n\
             Current date and time: `{now}`\n\n\
             Work systematically: gather the context you need, make the requested change, and \
             verify it before reporting completion.",
            now = Local::now().format("%Y-%m-%d %H:%M:%S"),
        )
    };

    let project_section = ctx
        .project_root
        .map(|root| {
            format!(
                "\n\n## Project Context\nProject root directory: `{}`\n\
                 - Prefer absolute paths over relative paths in every tool call.",
                root.display()
            )
        })
        .unwrap_or_default();

    let context_file_section = ctx
        .project_context_file
        .map(|content| format!("\n\n## Project Instructions\n\n{content}"))
        .unwrap_or_default();

    let guidelines_section = build_guidelines_section();

    let append_section = ctx.append.map(|extra| format!("\n\n{extra}")).unwrap_or_default();

    format!("{identity}{project_section}{context_file_section}\n\n{guidelines_section}{append_section}")
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cancellation;
mod compact;
mod prompts;
mod task_tool;
mod turn;

pub use cancellation::{new_pair, CancellationHandle, CancellationToken};
pub use compact::{
    compact_session, compact_session_with_strategy, emergency_compact, smart_truncate,
};
pub use prompts::{system_prompt, PromptContext};
pub use task_tool::TaskTool;
pub use turn::{AgenticLoop, TurnRequest};

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

//! Wire-level LLM message/tool-call types and the `ModelProvider` capability
//! boundary that isolates the vendor-specific LLM client from the Agentic
//! Loop. Which provider backs a run is an injected dependency; this crate
//! never dispatches on a provider name itself.

mod provider;
mod scripted;
mod types;

pub use provider::{InputModality, ModelProvider, ResponseStream};
pub use scripted::{EchoModelProvider, ScriptedModelProvider};
pub use types::{
    parse_data_url_parts, CompletionRequest, ContentPart, FunctionCall, Message, MessageContent,
    ResponseEvent, Role, ToolContentPart, ToolResultContent, ToolSchema, Usage,
};

//! Hosted language model access.

pub mod client;
pub mod json;

pub use client::{ContentBlock, LlmClient, LlmConfig, Message, Role, ToolDefinition};
pub use json::{parse_llm_json, string_field, string_list};

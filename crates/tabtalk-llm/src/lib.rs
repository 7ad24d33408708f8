//! tabtalk-llm: chat-completion wire types and providers
//!
//! Defines the message/tool data model shared with the orchestrator, the
//! `CompletionProvider` trait, and the OpenAI-compatible HTTP client.

pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use openai::OpenAiCompatClient;
pub use provider::{BoxedProvider, CompletionProvider};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, TokenUsage, ToolCall, ToolChoice, ToolDefinition,
};

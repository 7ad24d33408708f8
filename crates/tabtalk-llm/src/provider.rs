//! Completion provider trait
//!
//! The single seam between the orchestrator and the remote endpoint.
//! Tests substitute a scripted implementation.

use async_trait::async_trait;
use tabtalk_core::Result;

use crate::types::{ChatRequest, ChatResponse};

/// A chat-completion backend.
///
/// Implementations perform one blocking network round trip per call and
/// must surface non-2xx responses as `Error::Transport` and structurally
/// broken bodies as `Error::MalformedResponse`. No retries, no streaming.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Request the model's next assistant turn over the given transcript
    /// and tool declarations.
    async fn complete(&self, model: &str, request: ChatRequest) -> Result<ChatResponse>;
}

/// Boxed provider for dynamic dispatch
pub type BoxedProvider = std::sync::Arc<dyn CompletionProvider>;

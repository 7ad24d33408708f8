//! Decide/execute/synthesize orchestration
//!
//! One run: seed the transcript with system + user message, ask the
//! model to decide, execute any requested tool calls sequentially in
//! emitted order, then ask the model to synthesize a final answer over
//! the full transcript. At most one tool-execution round per run.
//!
//! Tool-level failures (unknown name, bad arguments, executor errors)
//! are folded into the transcript as tool results so the model can
//! react to them; endpoint failures abort the run.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tabtalk_core::{config, Error, Result};
use tabtalk_llm::{BoxedProvider, ChatMessage, ChatRequest, ChatResponse, ToolDefinition};
use tabtalk_tools::{RunContext, ToolRegistry};

use crate::system_prompt::SYSTEM_PROMPT;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model id sent with every completion request
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// SQLite database the SQL tools run against
    pub db_path: PathBuf,
    /// Directory chart files are written into
    pub charts_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: config::DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            db_path: PathBuf::from("tabtalk.db"),
            charts_dir: PathBuf::from("charts"),
        }
    }
}

/// One-shot analytics agent.
///
/// Stateless across runs: each `run` call builds a fresh transcript and
/// a fresh `RunContext`, so independent runs may execute concurrently
/// while sharing only the read-only registry and provider.
pub struct Agent {
    provider: BoxedProvider,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: BoxedProvider, registry: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            provider,
            registry,
            config,
        }
    }

    /// Answer one user message.
    pub async fn run(&self, user_message: &str) -> Result<String> {
        self.run_inner(user_message, None).await
    }

    /// Answer one user message, aborting with `Error::Cancelled` when
    /// the token fires during a completion call.
    pub async fn run_with_cancel(
        &self,
        user_message: &str,
        cancel: CancellationToken,
    ) -> Result<String> {
        self.run_inner(user_message, Some(cancel)).await
    }

    async fn run_inner(
        &self,
        user_message: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<String> {
        let ctx = RunContext::new(&self.config.db_path, &self.config.charts_dir);
        let tools = tool_declarations(&self.registry);

        let mut transcript = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_message),
        ];

        // Decision pass
        let decision = self
            .complete(transcript.clone(), &tools, cancel.as_ref())
            .await?;

        if decision.is_final() {
            debug!("Model answered without tools after one round trip");
            return Ok(decision.message.content_str().to_string());
        }

        let calls = decision.message.tool_calls.clone().unwrap_or_default();
        info!("Model requested {} tool call(s)", calls.len());
        transcript.push(decision.message);

        // Execute in emitted order, one at a time; results may feed
        // later calls in the same batch through the run context.
        for call in &calls {
            let result = match self.registry.resolve(&call.name) {
                Some(_) => self.registry.run(&call.name, call.arguments.clone(), &ctx).await,
                None => {
                    warn!("Model requested unknown tool '{}'", call.name);
                    format!("Error: tool '{}' is not registered", call.name)
                }
            };
            debug!("Tool '{}' ({}) -> {} bytes", call.name, call.id, result.len());
            transcript.push(ChatMessage::tool_result(&call.id, result));
        }

        // Synthesis pass over the full transcript. Tools stay declared,
        // but a second round of calls is not chased.
        let synthesis = self.complete(transcript, &tools, cancel.as_ref()).await?;
        if !synthesis.is_final() {
            warn!(
                "Synthesis response requested {} further tool call(s); ignored",
                synthesis.tool_calls().len()
            );
        }

        Ok(synthesis.message.content_str().to_string())
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
        cancel: Option<&CancellationToken>,
    ) -> Result<ChatResponse> {
        let request = ChatRequest::new(messages)
            .with_tools(tools.to_vec())
            .with_temperature(self.config.temperature);

        match cancel {
            None => self.provider.complete(&self.config.model, request).await,
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(Error::Cancelled),
                    result = self.provider.complete(&self.config.model, request) => result,
                }
            }
        }
    }
}

/// Registry declarations in the wire shape the provider expects.
fn tool_declarations(registry: &ToolRegistry) -> Vec<ToolDefinition> {
    registry
        .definitions()
        .into_iter()
        .map(|d| ToolDefinition {
            name: d.name,
            description: d.description,
            parameters: d.parameters,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tabtalk_tools::register_builtin_tools;

    #[test]
    fn test_tool_declarations_match_registry() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry).unwrap();

        let declarations = tool_declarations(&registry);
        assert_eq!(declarations.len(), registry.len());
        assert!(declarations.iter().any(|d| d.name == "sql_query"));
        assert!(declarations
            .iter()
            .all(|d| !d.description.is_empty() && d.parameters.is_object()));
    }

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.db_path, PathBuf::from("tabtalk.db"));
    }

    #[test]
    fn test_agent_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Agent>();
        let _ = Arc::new(ToolRegistry::new());
    }
}

//! Core Tool trait
//!
//! Defines the interface every callable tool implements.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::context::RunContext;

/// A named, schema-described capability the model may invoke.
///
/// Executors consume arguments that already passed schema validation and
/// return their result as a string; the orchestrator treats all tool
/// output as opaque text. Return `Err` for execution failures — the
/// registry folds them into a result string before they reach the
/// transcript.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (unique identifier, must match what the model requests)
    fn name(&self) -> &str;

    /// Human-readable description shown to the model
    fn description(&self) -> &str;

    /// JSON Schema for the accepted arguments
    fn parameters(&self) -> Value;

    /// Execute with validated arguments against the current run's context
    async fn execute(&self, args: Value, ctx: &RunContext) -> Result<String>;
}

/// Type alias for shared tools
pub type BoxedTool = Arc<dyn Tool>;

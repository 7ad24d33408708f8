//! Tool Registry
//!
//! A fixed name→tool map built once at startup and read-only afterwards,
//! so concurrent agent runs can share it without locking. Argument
//! schemas are compiled at registration; validation failures and
//! executor errors come back as result strings, never as panics or
//! errors across the orchestration boundary.

use anyhow::{anyhow, Result};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::tool::BoxedTool;

/// Tool declaration metadata exposed verbatim to the model
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

struct RegisteredTool {
    tool: BoxedTool,
    schema: JSONSchema,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, compiling its argument schema.
    ///
    /// Fails on a duplicate name or a schema that does not compile —
    /// both are wiring bugs, not runtime conditions.
    pub fn register(&mut self, tool: BoxedTool) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(anyhow!("tool '{}' is already registered", name));
        }

        let parameters = tool.parameters();
        let schema = JSONSchema::compile(&parameters)
            .map_err(|e| anyhow!("invalid parameter schema for tool '{}': {}", name, e))?;

        debug!("Registered tool: {}", name);
        self.tools.insert(name, RegisteredTool { tool, schema });
        Ok(())
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Option<BoxedTool> {
        self.tools.get(name).map(|r| r.tool.clone())
    }

    /// Declarations for every registered tool, sorted by name so the
    /// model sees a stable ordering.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|r| ToolDefinition {
                name: r.tool.name().to_string(),
                description: r.tool.description().to_string(),
                parameters: r.tool.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate arguments and execute a registered tool.
    ///
    /// Every failure mode (bad arguments, executor error) is folded into
    /// the returned string so the orchestrator can append it to the
    /// transcript as an ordinary tool result. Callers must have resolved
    /// the name first; an unknown name here also yields an error string.
    pub async fn run(&self, name: &str, args: Value, ctx: &RunContext) -> String {
        let registered = match self.tools.get(name) {
            Some(r) => r,
            None => return format!("Error: tool '{}' is not registered", name),
        };

        if let Err(errors) = registered.schema.validate(&args) {
            let reasons: Vec<String> = errors.map(|e| e.to_string()).collect();
            warn!("Rejected arguments for tool '{}': {}", name, reasons.join("; "));
            return format!(
                "Error: invalid arguments for tool '{}': {}",
                name,
                reasons.join("; ")
            );
        }

        match registered.tool.execute(args, ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Tool '{}' failed: {:#}", name, e);
                format!("Error: tool '{}' failed: {:#}", name, e)
            }
        }
    }
}

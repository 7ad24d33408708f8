//! tabtalk-tools: Tool trait, registry and builtin tools
//!
//! Provides the `Tool` trait, the fixed name-keyed registry the
//! orchestrator dispatches through, the per-run `RunContext`, and the
//! four builtin data-analysis tools.

pub mod builtin;
pub mod context;
pub mod eval;
pub mod registry;
pub mod tool;

// Re-export main types
pub use builtin::register_builtin_tools;
pub use context::RunContext;
pub use registry::{ToolDefinition, ToolRegistry};
pub use tool::{BoxedTool, Tool};

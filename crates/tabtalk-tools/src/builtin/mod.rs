//! Builtin data-analysis tools

pub mod chart;
pub mod compute;
pub mod extract;
pub mod sql;

use std::sync::Arc;

use crate::registry::ToolRegistry;

pub use chart::RenderChartTool;
pub use compute::ComputeTool;
pub use extract::ExtractTableTool;
pub use sql::SqlQueryTool;

/// Register the builtin tool suite
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> anyhow::Result<()> {
    registry.register(Arc::new(SqlQueryTool))?;
    registry.register(Arc::new(ExtractTableTool))?;
    registry.register(Arc::new(ComputeTool))?;
    registry.register(Arc::new(RenderChartTool))?;
    Ok(())
}

//! Table extraction tool
//!
//! Runs a query and keeps the decoded rows in the run's context so the
//! `compute` and `render_chart` tools can work on them without going
//! back to the database.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::builtin::sql::query_rows;
use crate::context::RunContext;
use crate::tool::Tool;

pub struct ExtractTableTool;

#[async_trait]
impl Tool for ExtractTableTool {
    fn name(&self) -> &str {
        "extract_table"
    }

    fn description(&self) -> &str {
        "Run a SQL query and store the full result set under a name for \
         this conversation turn. Stored tables can be referenced by the \
         compute tool (e.g. sum(name.column)) and by render_chart. Use \
         sql_query instead when you only need to look at the rows."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "SQL query producing the rows to store"
                },
                "name": {
                    "type": "string",
                    "pattern": "^[A-Za-z_][A-Za-z0-9_]*$",
                    "description": "Name to store the result set under"
                }
            },
            "required": ["sql", "name"]
        })
    }

    async fn execute(&self, args: Value, ctx: &RunContext) -> Result<String> {
        let sql = args["sql"].as_str().unwrap_or_default();
        let name = args["name"].as_str().unwrap_or_default();
        debug!("extract_table '{}': {}", name, sql);

        let rows = query_rows(ctx.db_path(), sql)?;
        let count = rows.len();
        ctx.store_table(name, rows);

        Ok(format!("Stored {} rows as '{}'", count, name))
    }
}

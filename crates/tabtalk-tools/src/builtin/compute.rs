//! Compute tool
//!
//! Evaluates one expression from the closed sublanguage in
//! `crate::eval` against the run's extracted tables.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::context::RunContext;
use crate::eval::{evaluate, format_number};
use crate::tool::Tool;

pub struct ComputeTool;

#[async_trait]
impl Tool for ComputeTool {
    fn name(&self) -> &str {
        "compute"
    }

    fn description(&self) -> &str {
        "Evaluate a numeric expression. Supports +, -, *, /, %, \
         parentheses, abs/sqrt/floor/ceil/round, and the aggregates \
         sum/avg/min/max/count over tables stored with extract_table, \
         referenced as name.column (count also accepts a bare table \
         name). Example: round(sum(uv.uv) / count(uv), 2)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Expression to evaluate"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, args: Value, ctx: &RunContext) -> Result<String> {
        let expression = args["expression"].as_str().unwrap_or_default();
        debug!("compute: {}", expression);

        let value = evaluate(expression, ctx).map_err(|e| anyhow!(e.to_string()))?;
        Ok(format_number(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn ctx_with_table() -> RunContext {
        let ctx = RunContext::new("/tmp/none.db", "/tmp/charts");
        let rows: Vec<Map<String, Value>> = (1..=4)
            .map(|i| {
                let mut row = Map::new();
                row.insert("v".to_string(), json!(i * 10));
                row
            })
            .collect();
        ctx.store_table("t", rows);
        ctx
    }

    #[tokio::test]
    async fn test_compute_aggregate() {
        let ctx = ctx_with_table();
        let out = ComputeTool
            .execute(json!({"expression": "sum(t.v) / count(t)"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "25");
    }

    #[tokio::test]
    async fn test_compute_reports_eval_errors() {
        let ctx = ctx_with_table();
        let err = ComputeTool
            .execute(json!({"expression": "sum(ghost.v)"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }
}

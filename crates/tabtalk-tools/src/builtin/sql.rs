//! SQL query tool
//!
//! Runs a SQL statement against the run's SQLite database and returns
//! the rows as pretty-printed JSON.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::debug;

use crate::context::{Rows, RunContext};
use crate::tool::Tool;

pub struct SqlQueryTool;

#[async_trait]
impl Tool for SqlQueryTool {
    fn name(&self) -> &str {
        "sql_query"
    }

    fn description(&self) -> &str {
        "Run a SQL statement against the analytics database and return the \
         result rows as JSON. Use this for lookups and ad-hoc queries; to \
         keep a whole result set for later computation or charting, use \
         extract_table instead."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "SQL statement to execute"
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, args: Value, ctx: &RunContext) -> Result<String> {
        let sql = args["sql"].as_str().unwrap_or_default();
        debug!("sql_query: {}", sql);

        let rows = query_rows(ctx.db_path(), sql)?;
        Ok(serde_json::to_string_pretty(&rows)?)
    }
}

/// Run a statement and decode every row into a JSON object.
pub(crate) fn query_rows(db_path: &Path, sql: &str) -> Result<Rows> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    let mut stmt = conn.prepare(sql).context("failed to prepare statement")?;
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let mut rows = stmt.query([]).context("query failed")?;
    let mut out = Vec::new();

    while let Some(row) = rows.next()? {
        let mut obj = Map::new();
        for (i, name) in column_names.iter().enumerate() {
            let value = match row.get_ref(i)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(v) => json!(v),
                ValueRef::Real(v) => json!(v),
                ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Blob(b) => Value::String(format!("blob({} bytes)", b.len())),
            };
            obj.insert(name.clone(), value);
        }
        out.push(obj);
    }

    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn seeded_db() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("demo.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE app_uv (date TEXT PRIMARY KEY, uv INTEGER NOT NULL);
            INSERT INTO app_uv (date, uv) VALUES
                ('2024-01-01', 120),
                ('2024-01-02', 140),
                ('2024-01-03', 95);
            "#,
        )
        .unwrap();
        (dir, db_path)
    }

    #[tokio::test]
    async fn test_sql_query_returns_json_rows() {
        let (dir, db_path) = seeded_db();
        let ctx = RunContext::new(&db_path, dir.path().join("charts"));

        let out = SqlQueryTool
            .execute(
                json!({"sql": "SELECT * FROM app_uv ORDER BY date DESC LIMIT 2"}),
                &ctx,
            )
            .await
            .unwrap();

        let rows: Vec<Map<String, Value>> = serde_json::from_str(&out).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["date"], json!("2024-01-03"));
        assert_eq!(rows[0]["uv"], json!(95));
    }

    #[tokio::test]
    async fn test_sql_query_bad_statement_errors() {
        let (dir, db_path) = seeded_db();
        let ctx = RunContext::new(&db_path, dir.path().join("charts"));

        let result = SqlQueryTool
            .execute(json!({"sql": "SELECT * FROM no_such_table"}), &ctx)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_query_rows_decodes_null_and_real() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("t.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE t (a REAL, b TEXT); INSERT INTO t VALUES (1.5, NULL);",
        )
        .unwrap();

        let rows = query_rows(&db_path, "SELECT * FROM t").unwrap();
        assert_eq!(rows[0]["a"], json!(1.5));
        assert_eq!(rows[0]["b"], Value::Null);
    }
}

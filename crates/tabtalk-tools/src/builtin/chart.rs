//! Chart rendering tool
//!
//! Shapes a stored table into a chart-option JSON document (the format
//! a charting frontend consumes directly) and writes it under the run's
//! chart directory.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::context::{Rows, RunContext};
use crate::tool::Tool;

pub struct RenderChartTool;

#[async_trait]
impl Tool for RenderChartTool {
    fn name(&self) -> &str {
        "render_chart"
    }

    fn description(&self) -> &str {
        "Generate a chart configuration (JSON) from a table previously \
         stored with extract_table and save it for the frontend to \
         render. line/bar plot y_field over x_field categories; scatter \
         plots (x_field, y_field) pairs; pie shows the count of rows per \
         distinct x_field value and needs no y_field. Returns the path \
         of the written chart file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chart_type": {
                    "type": "string",
                    "enum": ["line", "bar", "scatter", "pie"]
                },
                "table": {
                    "type": "string",
                    "description": "Name of a table stored with extract_table"
                },
                "x_field": {
                    "type": "string",
                    "description": "Column used for the x axis (or pie slices)"
                },
                "y_field": {
                    "type": "string",
                    "description": "Column plotted on the y axis (unused for pie)"
                },
                "title": {
                    "type": "string",
                    "description": "Chart title"
                }
            },
            "required": ["chart_type", "table", "x_field", "title"]
        })
    }

    async fn execute(&self, args: Value, ctx: &RunContext) -> Result<String> {
        let chart_type = args["chart_type"].as_str().unwrap_or_default();
        let table = args["table"].as_str().unwrap_or_default();
        let x_field = args["x_field"].as_str().unwrap_or_default();
        let y_field = args["y_field"].as_str();
        let title = args["title"].as_str().unwrap_or_default();

        let rows = ctx.table(table).ok_or_else(|| {
            anyhow!(
                "no table named '{}' has been stored; call extract_table first",
                table
            )
        })?;
        if rows.is_empty() {
            bail!("table '{}' is empty, nothing to plot", table);
        }

        let option = match chart_type {
            "line" | "bar" => {
                let y_field = y_field
                    .ok_or_else(|| anyhow!("y_field is required for {} charts", chart_type))?;
                category_option(chart_type, &rows, x_field, y_field, title)?
            }
            "scatter" => {
                let y_field =
                    y_field.ok_or_else(|| anyhow!("y_field is required for scatter charts"))?;
                scatter_option(&rows, x_field, y_field, title)?
            }
            "pie" => pie_option(&rows, x_field, title)?,
            other => bail!("unsupported chart type '{}'", other),
        };

        std::fs::create_dir_all(ctx.charts_dir()).with_context(|| {
            format!("failed to create chart directory {}", ctx.charts_dir().display())
        })?;

        let filename = format!("chart_{}.json", Uuid::new_v4().simple());
        let path = ctx.charts_dir().join(&filename);
        std::fs::write(&path, serde_json::to_string_pretty(&option)?)
            .with_context(|| format!("failed to write chart file {}", path.display()))?;

        debug!("render_chart wrote {}", path.display());
        Ok(format!("Chart config written to {}", path.display()))
    }
}

/// Pull a field from every row, failing when it exists in none.
fn field_values<'a>(rows: &'a Rows, field: &str) -> Result<Vec<&'a Value>> {
    if !rows.iter().any(|row| row.contains_key(field)) {
        bail!("column '{}' does not exist in the stored table", field);
    }
    Ok(rows
        .iter()
        .map(|row| row.get(field).unwrap_or(&Value::Null))
        .collect())
}

fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn category_option(
    chart_type: &str,
    rows: &Rows,
    x_field: &str,
    y_field: &str,
    title: &str,
) -> Result<Value> {
    let x_values = field_values(rows, x_field)?;
    let y_values = field_values(rows, y_field)?;

    // Distinct categories in first-seen order
    let mut categories: Vec<String> = Vec::new();
    for value in &x_values {
        let label = value_label(value);
        if !categories.contains(&label) {
            categories.push(label);
        }
    }

    let series: Vec<Value> = y_values.iter().map(|v| (*v).clone()).collect();

    Ok(json!({
        "title": { "text": title },
        "tooltip": {},
        "xAxis": { "type": "category", "data": categories },
        "yAxis": { "type": "value" },
        "series": [{ "type": chart_type, "data": series }]
    }))
}

fn scatter_option(rows: &Rows, x_field: &str, y_field: &str, title: &str) -> Result<Value> {
    let x_values = field_values(rows, x_field)?;
    let y_values = field_values(rows, y_field)?;

    let points: Vec<Value> = x_values
        .iter()
        .zip(y_values.iter())
        .map(|(x, y)| json!([x, y]))
        .collect();

    Ok(json!({
        "title": { "text": title },
        "tooltip": {},
        "xAxis": { "type": "value" },
        "yAxis": { "type": "value" },
        "series": [{ "type": "scatter", "data": points }]
    }))
}

fn pie_option(rows: &Rows, x_field: &str, title: &str) -> Result<Value> {
    let x_values = field_values(rows, x_field)?;

    // Count per distinct value, first-seen order
    let mut counts: Vec<(String, u64)> = Vec::new();
    for value in &x_values {
        let label = value_label(value);
        match counts.iter_mut().find(|(name, _)| *name == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    let data: Vec<Value> = counts
        .into_iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();

    Ok(json!({
        "title": { "text": title },
        "series": [{ "type": "pie", "data": data }]
    }))
}

//! CSV import utility
//!
//! Creates the destination table from the CSV header (column types
//! detected from the first non-empty value in each column), inserts the
//! rows, and upserts on the first column. Rows that do not match the
//! detected types are skipped with a warning rather than aborting the
//! import, so a partially bad file still seeds the database.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::path::Path;
use tracing::{info, warn};

pub struct ImportReport {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Integer,
    Real,
    Date,
    Text,
}

impl ColumnKind {
    fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Real => "REAL",
            ColumnKind::Date | ColumnKind::Text => "TEXT",
        }
    }

    fn detect(value: &str) -> Self {
        if value.parse::<i64>().is_ok() {
            ColumnKind::Integer
        } else if value.parse::<f64>().is_ok() {
            ColumnKind::Real
        } else if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
            ColumnKind::Date
        } else {
            ColumnKind::Text
        }
    }

    /// Convert one field, or explain why the row must be skipped.
    fn convert(self, value: &str) -> std::result::Result<SqlValue, String> {
        if value.is_empty() {
            return Ok(SqlValue::Null);
        }
        match self {
            ColumnKind::Integer => value
                .parse::<i64>()
                .map(SqlValue::Integer)
                .map_err(|_| format!("'{}' is not an integer", value)),
            ColumnKind::Real => value
                .parse::<f64>()
                .map(SqlValue::Real)
                .map_err(|_| format!("'{}' is not a number", value)),
            ColumnKind::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|d| SqlValue::Text(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| format!("'{}' is not a YYYY-MM-DD date", value)),
            ColumnKind::Text => Ok(SqlValue::Text(value.to_string())),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_line(line: &str) -> Vec<String> {
    line.trim_end_matches('\r')
        .split(',')
        .map(|field| field.trim().to_string())
        .collect()
}

/// Import a headerful CSV file into `table`, upserting on the first
/// column.
pub fn import_csv(csv_path: &Path, table: &str, db_path: &Path) -> Result<ImportReport> {
    if !is_identifier(table) {
        bail!("'{}' is not a valid table name", table);
    }

    let content = std::fs::read_to_string(csv_path)
        .with_context(|| format!("failed to read {}", csv_path.display()))?;
    let mut lines = content.lines();

    let header = lines
        .next()
        .context("CSV file is empty, expected a header row")?;
    let columns = split_line(header);
    if columns.is_empty() || columns.iter().any(|c| !is_identifier(c)) {
        bail!("CSV header '{}' does not name valid columns", header);
    }

    let records: Vec<Vec<String>> = lines
        .filter(|line| !line.trim().is_empty())
        .map(split_line)
        .collect();

    // Detect each column's type from its first non-empty value
    let kinds: Vec<ColumnKind> = (0..columns.len())
        .map(|i| {
            records
                .iter()
                .filter_map(|r| r.get(i))
                .find(|v| !v.is_empty())
                .map(|v| ColumnKind::detect(v))
                .unwrap_or(ColumnKind::Text)
        })
        .collect();

    let mut conn = Connection::open(db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    let column_defs: Vec<String> = columns
        .iter()
        .zip(kinds.iter())
        .enumerate()
        .map(|(i, (name, kind))| {
            if i == 0 {
                format!("{} {} PRIMARY KEY", name, kind.sql_type())
            } else {
                format!("{} {}", name, kind.sql_type())
            }
        })
        .collect();
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        table,
        column_defs.join(", ")
    ))?;

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = columns[1..]
        .iter()
        .map(|c| format!("{} = excluded.{}", c, c))
        .collect();
    let conflict_clause = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    let insert_sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        columns[0],
        conflict_clause
    );

    let mut inserted = 0;
    let mut skipped = 0;

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&insert_sql)?;

        for (line_no, record) in records.iter().enumerate() {
            match convert_record(record, &columns, &kinds) {
                Ok(values) => {
                    stmt.execute(rusqlite::params_from_iter(values))?;
                    inserted += 1;
                }
                Err(reason) => {
                    warn!("Skipping row {}: {}", line_no + 2, reason);
                    skipped += 1;
                }
            }
        }
    }
    tx.commit()?;

    info!(
        "Imported {} rows into '{}' from {} ({} skipped)",
        inserted,
        table,
        csv_path.display(),
        skipped
    );

    Ok(ImportReport { inserted, skipped })
}

fn convert_record(
    record: &[String],
    columns: &[String],
    kinds: &[ColumnKind],
) -> std::result::Result<Vec<SqlValue>, String> {
    if record.len() != columns.len() {
        return Err(format!(
            "expected {} fields, found {}",
            columns.len(),
            record.len()
        ));
    }
    if record[0].is_empty() {
        return Err(format!("key column '{}' is empty", columns[0]));
    }

    record
        .iter()
        .zip(kinds.iter())
        .zip(columns.iter())
        .map(|((value, kind), column)| {
            kind.convert(value)
                .map_err(|reason| format!("column '{}': {}", column, reason))
        })
        .collect()
}

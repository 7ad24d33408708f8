//! Per-run execution context
//!
//! Holds everything a tool may touch during one agent run: the database
//! path, the chart output directory, and the table store that
//! `extract_table` fills and `compute`/`render_chart` read. Created at
//! the start of a run and discarded with it, so nothing leaks between
//! runs.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Rows decoded from a query: one JSON object per row
pub type Rows = Vec<Map<String, Value>>;

pub struct RunContext {
    db_path: PathBuf,
    charts_dir: PathBuf,
    tables: Mutex<HashMap<String, Rows>>,
}

impl RunContext {
    pub fn new(db_path: impl Into<PathBuf>, charts_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            charts_dir: charts_dir.into(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn charts_dir(&self) -> &Path {
        &self.charts_dir
    }

    /// Store extracted rows under a name, replacing any previous entry.
    pub fn store_table(&self, name: impl Into<String>, rows: Rows) {
        self.tables.lock().unwrap().insert(name.into(), rows);
    }

    /// Fetch a copy of a stored table.
    pub fn table(&self, name: &str) -> Option<Rows> {
        self.tables.lock().unwrap().get(name).cloned()
    }

    /// Names of all stored tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

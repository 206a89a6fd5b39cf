//! Pre-parsed table sidecars.
//!
//! A document `nota.pdf` may come with `nota.tables.json`: an array of
//! tables, each an array of rows, each an array of cells. Cells are usually
//! strings; numbers are stringified and nulls become empty cells.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::{Result, Table};
use crate::error::SourceError;

/// Path of the sidecar for a document: same directory, file stem plus suffix.
pub fn sidecar_path(document: &Path, suffix: &str) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    document.with_file_name(format!("{}{}", stem, suffix))
}

/// Load the sidecar for a document; a missing sidecar means no tables.
pub fn load_sidecar(document: &Path, suffix: &str) -> Result<Vec<Table>> {
    let path = sidecar_path(document, suffix);
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let tables = load_tables(&path)?;
    debug!("Loaded {} tables from {}", tables.len(), path.display());
    Ok(tables)
}

/// Parse a table file.
pub fn load_tables(path: &Path) -> Result<Vec<Table>> {
    let content = fs::read_to_string(path)?;
    parse_tables(&content).map_err(|reason| SourceError::Tables {
        path: path.display().to_string(),
        reason,
    })
}

pub fn parse_tables(content: &str) -> std::result::Result<Vec<Table>, String> {
    let raw: Vec<Vec<Vec<Value>>> = serde_json::from_str(content).map_err(|e| e.to_string())?;

    Ok(raw
        .into_iter()
        .map(|table| {
            table
                .into_iter()
                .map(|row| row.into_iter().map(cell_text).collect())
                .collect()
        })
        .collect())
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

//! Notebook cell stripping
//!
//! Removes tagged cells from a Jupyter notebook while leaving the rest of
//! the document untouched. Used to publish exercise notebooks without their
//! solution cells.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::errors::{Fa2CfError, Result};

/// Cell tags that mark a cell for removal
pub const DEFAULT_REMOVE_TAGS: [&str; 1] = ["hide"];

/// Drop every cell whose `metadata.tags` intersects `tags` and return the
/// number of removed cells. Surviving cells keep their relative order and
/// every other notebook field stays as it was.
pub fn strip_cells(doc: &mut Value, tags: &[&str]) -> Result<usize> {
    let nbformat = doc
        .get("nbformat")
        .and_then(Value::as_i64)
        .ok_or_else(|| Fa2CfError::Notebook("missing nbformat field".to_string()))?;
    if nbformat != 4 {
        return Err(Fa2CfError::Notebook(format!(
            "unsupported nbformat {} (expected 4)",
            nbformat
        )));
    }
    let cells = doc
        .get_mut("cells")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| Fa2CfError::Notebook("missing cells array".to_string()))?;
    let before = cells.len();
    cells.retain(|cell| !has_any_tag(cell, tags));
    Ok(before - cells.len())
}

fn has_any_tag(cell: &Value, tags: &[&str]) -> bool {
    cell.get("metadata")
        .and_then(|m| m.get("tags"))
        .and_then(Value::as_array)
        .map(|cell_tags| {
            cell_tags
                .iter()
                .filter_map(Value::as_str)
                .any(|t| tags.contains(&t))
        })
        .unwrap_or(false)
}

/// Read `input`, drop the cells tagged for removal and write the result to
/// `output` as pretty-printed JSON.
pub fn strip_notebook(input: &Path, output: &Path) -> Result<()> {
    let text = fs::read_to_string(input)?;
    let mut doc: Value = serde_json::from_str(&text)?;
    let removed = strip_cells(&mut doc, &DEFAULT_REMOVE_TAGS)?;
    let rendered = serde_json::to_string_pretty(&doc)?;
    fs::write(output, rendered + "\n")?;
    info!(removed, output = %output.display(), "notebook stripped");
    Ok(())
}

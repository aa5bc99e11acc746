use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::Local;
use csv::WriterBuilder;

use crate::pivot::tree::PivotTree;

/// Spaces of label indentation per depth level in exported rows.
pub const INDENT_WIDTH: usize = 4;

/// Currently visible rows as text records: headers first, label column
/// indented by depth, grand-total row appended last verbatim.
pub fn export_rows(tree: &PivotTree, indent_width: usize) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    rows.push(tree.headers().to_vec());

    for index in tree.visible_indices() {
        let node = &tree.nodes()[index];
        let mut cells = node.cells.clone();
        if node.depth > 0 {
            if let Some(label) = cells.first_mut() {
                *label = format!("{}{}", " ".repeat(node.depth * indent_width), label);
            }
        }
        rows.push(cells);
    }

    if let Some(total) = tree.grand_total() {
        rows.push(total.to_vec());
    }
    rows
}

/// Render the visible rows as `;`-delimited CSV text: every field quoted
/// with doubled internal quotes, prefixed with a UTF-8 byte-order marker.
pub fn to_csv(tree: &PivotTree, indent_width: usize) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    for row in export_rows(tree, indent_width) {
        writer.write_record(&row)?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("CSV export failed: {}", e))?;
    Ok(format!("\u{feff}{}", String::from_utf8(bytes)?))
}

/// `pivot_export_<ISO-date>.csv`.
pub fn export_filename() -> String {
    format!("pivot_export_{}.csv", Local::now().format("%Y-%m-%d"))
}

/// Write the export file into `dir` and return its path.
pub fn write_csv(tree: &PivotTree, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(export_filename());
    fs::write(&path, to_csv(tree, INDENT_WIDTH)?)?;
    Ok(path)
}

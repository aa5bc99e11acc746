use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable identity token for a column, assigned at column-definition time.
///
/// Identity is deliberately decoupled from the display label (which may be
/// localized) and from any presentation class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColumnId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One column of the live table.
#[derive(Debug, Clone)]
pub struct Column {
    pub id: ColumnId,
    /// Request/sort field name.
    pub field: String,
    /// Display label, possibly localized.
    pub label: String,
    pub sortable: bool,
    pub visible: bool,
    /// Pixel width as written, e.g. "120px". None means unset (default layout).
    pub width: Option<String>,
}

impl Column {
    pub fn new(id: impl Into<String>, field: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: ColumnId::new(id),
            field: field.into(),
            label: label.into(),
            sortable: true,
            visible: true,
            width: None,
        }
    }
}

/// One rendered row: cell text in source-column order plus the raw record
/// payload it was rendered from, if any.
#[derive(Debug, Clone, Default)]
pub struct TableRow {
    pub cells: Vec<String>,
    pub record: Option<Value>,
}

impl TableRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self {
            cells,
            record: None,
        }
    }

    pub fn with_record(mut self, record: Value) -> Self {
        self.record = Some(record);
        self
    }
}

/// In-memory model of the currently rendered table.
///
/// Columns keep a fixed source order; display order is a separate
/// permutation so reordering never loses track of which cell belongs to
/// which column.
#[derive(Debug, Clone, Default)]
pub struct TableState {
    columns: Vec<Column>,
    display_order: Vec<usize>,
    rows: Vec<TableRow>,
}

impl TableState {
    pub fn new(columns: Vec<Column>) -> Self {
        let display_order = (0..columns.len()).collect();
        Self {
            columns,
            display_order,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<TableRow>) -> Self {
        self.rows = rows;
        self
    }

    pub fn push_row(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == id)
    }

    pub fn column_mut(&mut self, id: &ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| &c.id == id)
    }

    pub fn column_by_field(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Columns in display order.
    pub fn ordered_columns(&self) -> impl Iterator<Item = &Column> {
        self.display_order.iter().map(|&idx| &self.columns[idx])
    }

    /// Visible columns in display order.
    pub fn visible_columns(&self) -> Vec<&Column> {
        self.ordered_columns().filter(|c| c.visible).collect()
    }

    /// Field names of all declared (static) columns, source order.
    pub fn fields(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.field.clone()).collect()
    }

    /// Move a column to the end of the display order. Unknown ids are ignored.
    pub fn move_to_end(&mut self, id: &ColumnId) -> bool {
        let Some(source_idx) = self.columns.iter().position(|c| &c.id == id) else {
            return false;
        };
        let Some(pos) = self.display_order.iter().position(|&i| i == source_idx) else {
            return false;
        };
        let idx = self.display_order.remove(pos);
        self.display_order.push(idx);
        true
    }

    /// Drop `dragged` next to `target`: after it when dragged from the left,
    /// before it when dragged from the right.
    pub fn move_next_to(&mut self, dragged: &ColumnId, target: &ColumnId) -> bool {
        if dragged == target {
            return false;
        }
        let Some(src) = self.display_position(dragged) else {
            return false;
        };
        let Some(dst) = self.display_position(target) else {
            return false;
        };
        let idx = self.display_order.remove(src);
        // Removing the source shifts a later target left by one, which is
        // exactly "insert after"; an earlier target keeps its position.
        self.display_order.insert(dst, idx);
        true
    }

    fn display_position(&self, id: &ColumnId) -> Option<usize> {
        let source_idx = self.columns.iter().position(|c| &c.id == id)?;
        self.display_order.iter().position(|&i| i == source_idx)
    }

    pub fn set_visible(&mut self, id: &ColumnId, visible: bool) -> bool {
        match self.column_mut(id) {
            Some(col) => {
                col.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn set_width(&mut self, id: &ColumnId, width: Option<String>) -> bool {
        match self.column_mut(id) {
            Some(col) => {
                col.width = width;
                true
            }
            None => false,
        }
    }

    /// Append a column (e.g. a dynamic one) with one cell per existing row.
    pub fn append_column(&mut self, column: Column, cells: Vec<String>) {
        self.columns.push(column);
        self.display_order.push(self.columns.len() - 1);
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.cells.push(cell);
        }
    }

    /// Cell text for one row, visible columns only, display order.
    pub fn visible_cells(&self, row_index: usize) -> Vec<String> {
        let Some(row) = self.rows.get(row_index) else {
            return Vec::new();
        };
        self.display_order
            .iter()
            .filter(|&&idx| self.columns[idx].visible)
            .map(|&idx| row.cells.get(idx).cloned().unwrap_or_default())
            .collect()
    }

    /// Raw record payloads of all rows that carry one.
    pub fn records(&self) -> Vec<&Value> {
        self.rows.iter().filter_map(|r| r.record.as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_columns() -> TableState {
        TableState::new(vec![
            Column::new("col-a", "a", "A"),
            Column::new("col-b", "b", "B"),
            Column::new("col-c", "c", "C"),
        ])
    }

    fn ids(table: &TableState) -> Vec<&str> {
        table.ordered_columns().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn move_to_end_reorders_display_only() {
        let mut table = three_columns();
        assert!(table.move_to_end(&ColumnId::new("col-a")));
        assert_eq!(ids(&table), vec!["col-b", "col-c", "col-a"]);
        // Source order is untouched.
        assert_eq!(table.fields(), vec!["a", "b", "c"]);
    }

    #[test]
    fn move_next_to_drops_after_when_dragged_from_left() {
        let mut table = three_columns();
        assert!(table.move_next_to(&ColumnId::new("col-a"), &ColumnId::new("col-c")));
        assert_eq!(ids(&table), vec!["col-b", "col-c", "col-a"]);
    }

    #[test]
    fn move_next_to_drops_before_when_dragged_from_right() {
        let mut table = three_columns();
        assert!(table.move_next_to(&ColumnId::new("col-c"), &ColumnId::new("col-a")));
        assert_eq!(ids(&table), vec!["col-c", "col-a", "col-b"]);
    }

    #[test]
    fn visible_cells_follow_display_order_and_visibility() {
        let mut table = three_columns();
        table.push_row(TableRow::new(vec![
            "1".to_string(),
            "2".to_string(),
            "3".to_string(),
        ]));
        table.set_visible(&ColumnId::new("col-b"), false);
        table.move_to_end(&ColumnId::new("col-a"));
        assert_eq!(table.visible_cells(0), vec!["3", "1"]);
    }
}

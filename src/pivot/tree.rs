use std::ops::Range;

use tracing::debug;

use crate::pivot::filter::{parse_conditions, CompiledFilter};

/// One row of the depth-tagged pre-order aggregation tree.
///
/// `hidden` tracks collapse state, `filtered_out` the orthogonal filter
/// flag; a node renders only when neither is set.
#[derive(Debug, Clone)]
pub struct PivotNode {
    pub key: String,
    pub depth: usize,
    /// Cell text per column; the first cell is the label column.
    pub cells: Vec<String>,
    pub expanded: bool,
    pub hidden: bool,
    pub filtered_out: bool,
}

impl PivotNode {
    pub fn new(key: impl Into<String>, depth: usize, cells: Vec<String>) -> Self {
        Self {
            key: key.into(),
            depth,
            cells,
            expanded: false,
            hidden: depth > 0,
            filtered_out: false,
        }
    }

    pub fn label(&self) -> &str {
        self.cells.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_visible(&self) -> bool {
        !self.hidden && !self.filtered_out
    }
}

/// Header name plus a rough type hint for the filter-bar autocomplete,
/// inferred from the first data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHint {
    pub name: String,
    pub numeric: bool,
}

/// Owns the flat node arena and drives expand/collapse and local filtering.
///
/// The node sequence itself is rebuilt wholesale when the backing
/// aggregation changes; every operation here only flips per-node flags.
#[derive(Debug, Clone, Default)]
pub struct PivotTree {
    headers: Vec<String>,
    nodes: Vec<PivotNode>,
    grand_total: Option<Vec<String>>,
}

impl PivotTree {
    pub fn new(headers: Vec<String>, nodes: Vec<PivotNode>) -> Self {
        let mut tree = Self {
            headers,
            nodes,
            grand_total: None,
        };
        tree.reset();
        tree
    }

    pub fn with_grand_total(mut self, cells: Vec<String>) -> Self {
        self.grand_total = Some(cells);
        self
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn nodes(&self) -> &[PivotNode] {
        &self.nodes
    }

    pub fn grand_total(&self) -> Option<&[String]> {
        self.grand_total.as_deref()
    }

    /// Initial state: depth-0 nodes visible and collapsed, everything
    /// deeper hidden, filter flags cleared.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.hidden = node.depth > 0;
            node.expanded = false;
            node.filtered_out = false;
        }
    }

    /// End (exclusive) of the contiguous descendant run of `index`: the
    /// first subsequent node at the same or a shallower depth.
    fn subtree_end(&self, index: usize) -> usize {
        let depth = self.nodes[index].depth;
        self.nodes[index + 1..]
            .iter()
            .position(|n| n.depth <= depth)
            .map(|offset| index + 1 + offset)
            .unwrap_or(self.nodes.len())
    }

    /// All descendants of `index`, as an index range into the arena.
    pub fn descendants_of(&self, index: usize) -> Range<usize> {
        if index >= self.nodes.len() {
            return index..index;
        }
        index + 1..self.subtree_end(index)
    }

    /// Direct children only: the depth+1 nodes within the descendant run.
    pub fn children_of(&self, index: usize) -> Vec<usize> {
        if index >= self.nodes.len() {
            return Vec::new();
        }
        let depth = self.nodes[index].depth;
        self.descendants_of(index)
            .filter(|&i| self.nodes[i].depth == depth + 1)
            .collect()
    }

    /// Collapse an expanded node (hiding its whole descendant run and
    /// resetting their chevrons, so re-expanding does not reveal stale open
    /// grandchildren) or expand a collapsed one (revealing direct children
    /// only).
    pub fn toggle(&mut self, index: usize) {
        if index >= self.nodes.len() {
            return;
        }
        let run = self.descendants_of(index);
        let depth = self.nodes[index].depth;
        if self.nodes[index].expanded {
            self.nodes[index].expanded = false;
            for i in run {
                self.nodes[i].hidden = true;
                self.nodes[i].expanded = false;
            }
        } else {
            self.nodes[index].expanded = true;
            for i in run {
                if self.nodes[i].depth == depth + 1 {
                    self.nodes[i].hidden = false;
                }
            }
        }
    }

    /// Reveal every node and mark every chevron expanded. Ignores any
    /// active filter flags.
    pub fn expand_all(&mut self) {
        for node in &mut self.nodes {
            node.hidden = false;
            node.expanded = true;
        }
    }

    /// Hide every depth>0 node and mark every chevron collapsed. Ignores
    /// any active filter flags.
    pub fn collapse_all(&mut self) {
        for node in &mut self.nodes {
            if node.depth > 0 {
                node.hidden = true;
            }
            node.expanded = false;
        }
    }

    /// Apply the local filter box: empty input resets to the initial
    /// collapsed state; input containing `{column} op value` expressions
    /// runs as a smart filter; anything else is a free-text label search.
    pub fn local_filter(&mut self, query: &str) {
        let input = query.trim();
        if input.is_empty() {
            self.reset();
            return;
        }

        let conditions = parse_conditions(input);
        if !conditions.is_empty() {
            match CompiledFilter::resolve(&conditions, &self.headers) {
                Some(filter) => self.smart_filter(&filter),
                // Every condition named an unknown column: leave the view
                // untouched rather than guessing.
                None => debug!(target: "pivot", "No filter condition resolved; view unchanged"),
            }
        } else {
            self.text_filter(&input.to_lowercase());
        }
    }

    /// Depth-0 rows matching every condition are kept, with their entire
    /// descendant run revealed and expanded so partial matches show full
    /// detail. Everything else is marked filtered-out.
    fn smart_filter(&mut self, filter: &CompiledFilter) {
        for node in &mut self.nodes {
            node.filtered_out = true;
            node.hidden = false;
        }
        for index in 0..self.nodes.len() {
            if self.nodes[index].depth != 0 {
                continue;
            }
            if filter.matches_row(&self.nodes[index].cells) {
                self.reveal_group(index);
            }
        }
    }

    /// Free-text search: case-insensitive substring match against depth-0
    /// labels, with the same reveal semantics as the smart filter.
    fn text_filter(&mut self, needle: &str) {
        for node in &mut self.nodes {
            node.filtered_out = true;
            node.hidden = false;
        }
        for index in 0..self.nodes.len() {
            if self.nodes[index].depth != 0 {
                continue;
            }
            if self.nodes[index].label().to_lowercase().contains(needle) {
                self.reveal_group(index);
            }
        }
    }

    fn reveal_group(&mut self, index: usize) {
        self.nodes[index].filtered_out = false;
        self.nodes[index].expanded = true;
        for i in self.descendants_of(index) {
            self.nodes[i].filtered_out = false;
            self.nodes[i].expanded = true;
        }
    }

    /// Indices of currently visible nodes, document order.
    pub fn visible_indices(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_visible())
            .map(|(i, _)| i)
            .collect()
    }

    /// Header names with a numeric/text hint taken from the first data row.
    /// The label column always hints text.
    pub fn column_hints(&self) -> Vec<ColumnHint> {
        let first = self.nodes.first();
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.trim().is_empty())
            .map(|(idx, header)| {
                let numeric = idx > 0
                    && first
                        .and_then(|n| n.cells.get(idx))
                        .map(|cell| {
                            let compact: String =
                                cell.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
                            !compact.is_empty() && compact.parse::<f64>().is_ok()
                        })
                        .unwrap_or(false);
                ColumnHint {
                    name: header.trim().to_string(),
                    numeric,
                }
            })
            .collect()
    }
}

//! Local filter expression language: `{column} op value`, chained with AND.
//!
//! Input with no well-formed `{...}` expression falls back to free-text
//! search at the call site. Parsing never fails; malformed fragments are
//! skipped.

use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    NotEqual,
    Like,
    In,
    Between,
}

impl FilterOp {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            ">" => Some(FilterOp::GreaterThan),
            "<" => Some(FilterOp::LessThan),
            ">=" => Some(FilterOp::GreaterOrEqual),
            "<=" => Some(FilterOp::LessOrEqual),
            "=" => Some(FilterOp::Equal),
            "!=" => Some(FilterOp::NotEqual),
            "LIKE" => Some(FilterOp::Like),
            "IN" => Some(FilterOp::In),
            "BETWEEN" => Some(FilterOp::Between),
            _ => None,
        }
    }

    /// Operators that compare the cell numerically after stripping
    /// non-numeric characters.
    fn is_numeric(&self) -> bool {
        matches!(
            self,
            FilterOp::GreaterThan
                | FilterOp::LessThan
                | FilterOp::GreaterOrEqual
                | FilterOp::LessOrEqual
                | FilterOp::Equal
                | FilterOp::NotEqual
        )
    }
}

/// One `{column} op value` condition as typed by the user. Conditions
/// combine with implicit AND; there is no OR, negation, or grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub op: FilterOp,
    pub operand: String,
}

/// Head of one condition: `{column}` followed by an operator. The value is
/// whatever sits between one head and the next (minus the AND connective),
/// which keeps `BETWEEN a AND b` operands intact.
const CONDITION_HEAD: &str = r"\{([^}]+)\}\s*(>=|<=|!=|>|<|=|(?i:BETWEEN\b|LIKE\b|IN\b))";

pub fn parse_conditions(input: &str) -> Vec<FilterCondition> {
    let Ok(head_re) = Regex::new(CONDITION_HEAD) else {
        return Vec::new();
    };

    let heads: Vec<_> = head_re.captures_iter(input).collect();
    let mut conditions = Vec::new();
    for (i, caps) in heads.iter().enumerate() {
        let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let value_end = heads
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(input.len());
        let mut value = input[whole..value_end].trim();
        // Between two heads the trailing connective belongs to the chain,
        // not to the value.
        if i + 1 < heads.len() {
            value = strip_trailing_and(value);
        }
        if value.is_empty() {
            continue;
        }
        let column = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        let Some(op) = caps.get(2).and_then(|m| FilterOp::from_token(m.as_str())) else {
            continue;
        };
        if column.is_empty() {
            continue;
        }
        conditions.push(FilterCondition {
            column: column.to_string(),
            op,
            operand: value.to_string(),
        });
    }
    conditions
}

fn strip_trailing_and(value: &str) -> &str {
    let trimmed = value.trim_end();
    if trimmed.len() >= 3
        && trimmed.is_char_boundary(trimmed.len() - 3)
        && trimmed[trimmed.len() - 3..].eq_ignore_ascii_case("and")
    {
        let head = &trimmed[..trimmed.len() - 3];
        if head.ends_with(char::is_whitespace) || head.is_empty() {
            return head.trim_end();
        }
    }
    trimmed
}

/// A condition bound to a cell index in the header row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCondition {
    pub cell_index: usize,
    pub op: FilterOp,
    pub operand: String,
}

/// Conditions resolved against a concrete header row, ready to evaluate.
#[derive(Debug)]
pub struct CompiledFilter {
    conditions: Vec<ResolvedCondition>,
    strip_non_numeric: Option<Regex>,
}

impl CompiledFilter {
    /// Bind column names to cell positions, case-insensitively. Conditions
    /// naming unknown columns are dropped; `None` when nothing resolved.
    pub fn resolve(conditions: &[FilterCondition], headers: &[String]) -> Option<Self> {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let resolved: Vec<ResolvedCondition> = conditions
            .iter()
            .filter_map(|cond| {
                let wanted = cond.column.trim().to_lowercase();
                match lowered.iter().position(|h| *h == wanted) {
                    Some(idx) => Some(ResolvedCondition {
                        cell_index: idx,
                        op: cond.op,
                        operand: cond.operand.clone(),
                    }),
                    None => {
                        debug!(target: "pivot", "Dropping condition on unknown column {:?}", cond.column);
                        None
                    }
                }
            })
            .collect();

        if resolved.is_empty() {
            return None;
        }
        Some(Self {
            conditions: resolved,
            strip_non_numeric: Regex::new(r"[^0-9.\-]").ok(),
        })
    }

    pub fn conditions(&self) -> &[ResolvedCondition] {
        &self.conditions
    }

    /// A row matches only when every condition holds.
    pub fn matches_row(&self, cells: &[String]) -> bool {
        self.conditions.iter().all(|cond| self.matches(cond, cells))
    }

    fn matches(&self, cond: &ResolvedCondition, cells: &[String]) -> bool {
        let Some(cell) = cells.get(cond.cell_index) else {
            return false;
        };
        let cell = cell.trim();
        let operand = cond.operand.trim();

        if cond.op.is_numeric() {
            // Aggregation cells carry formatting (thousands separators,
            // currency), so strip before parsing.
            let stripped = self.strip_numeric(cell);
            let cell_num = if stripped.is_empty() {
                None
            } else {
                stripped.parse::<f64>().ok()
            };
            let operand_num = unquote(operand).parse::<f64>().ok();
            return match (cond.op, cell_num, operand_num) {
                (FilterOp::GreaterThan, Some(a), Some(b)) => a > b,
                (FilterOp::LessThan, Some(a), Some(b)) => a < b,
                (FilterOp::GreaterOrEqual, Some(a), Some(b)) => a >= b,
                (FilterOp::LessOrEqual, Some(a), Some(b)) => a <= b,
                (FilterOp::Equal, Some(a), Some(b)) => a == b,
                (FilterOp::NotEqual, Some(a), Some(b)) => a != b,
                // Either side non-numeric: =/!= fall back to string
                // equality, the ordering operators never match.
                (FilterOp::Equal, _, _) => cell.eq_ignore_ascii_case(unquote(operand)),
                (FilterOp::NotEqual, _, _) => !cell.eq_ignore_ascii_case(unquote(operand)),
                _ => false,
            };
        }

        match cond.op {
            FilterOp::Like => {
                let needle = unquote(operand).to_lowercase().replace('%', "");
                cell.to_lowercase().contains(&needle)
            }
            FilterOp::In => {
                let list = operand
                    .trim_start_matches('(')
                    .trim_end_matches(')')
                    .split(',');
                let cell_lower = cell.to_lowercase();
                list.map(|item| unquote(item.trim()).to_lowercase())
                    .any(|item| item == cell_lower)
            }
            FilterOp::Between => {
                let Some((low, high)) = split_bounds(operand) else {
                    return false;
                };
                let stripped = self.strip_numeric(cell);
                match stripped.parse::<f64>() {
                    Ok(v) => v >= low && v <= high,
                    Err(_) => false,
                }
            }
            _ => false,
        }
    }

    fn strip_numeric(&self, cell: &str) -> String {
        match &self.strip_non_numeric {
            Some(re) => re.replace_all(cell, "").into_owned(),
            None => cell
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect(),
        }
    }
}

/// Split a BETWEEN operand into its two inclusive numeric bounds.
fn split_bounds(operand: &str) -> Option<(f64, f64)> {
    let upper = operand.to_ascii_uppercase();
    let pos = upper.find(" AND ")?;
    let low = operand[..pos].trim().parse::<f64>().ok()?;
    let high = operand[pos + 5..].trim().parse::<f64>().ok()?;
    Some((low, high))
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

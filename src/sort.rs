use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "ASC")]
    Ascending,
    #[serde(rename = "DESC")]
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }

    pub fn glyph(&self) -> char {
        match self {
            SortDirection::Ascending => '▲',
            SortDirection::Descending => '▼',
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One active sort key. The wire names match the persisted blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(rename = "dir")]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }
}

/// Header indicator for a sorted column: direction glyph plus a 1-based
/// precedence rank when more than one key is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortIndicator {
    pub direction: SortDirection,
    pub rank: Option<usize>,
}

/// Owns the ordered list of active sort keys.
///
/// List order is tie-break precedence: the first entry is the primary key.
/// Fields are unique within the list.
#[derive(Debug, Clone, Default)]
pub struct SortEngine {
    keys: Vec<SortKey>,
}

impl SortEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Replace the active keys, keeping only the first entry per field.
    pub fn set_keys(&mut self, keys: Vec<SortKey>) {
        self.keys.clear();
        for key in keys {
            if !self.keys.iter().any(|k| k.field == key.field) {
                self.keys.push(key);
            }
        }
    }

    /// Apply one header click to the active keys.
    ///
    /// Per-field tri-state cycle: absent -> ASC -> DESC -> absent.
    /// `multi` keeps the other entries (order preserved, new fields appended);
    /// otherwise the click replaces the whole list, except that clicking the
    /// single active field cycles it in place.
    pub fn cycle(&mut self, field: &str, multi: bool) {
        let idx = self.keys.iter().position(|k| k.field == field);
        let next = match idx.map(|i| self.keys[i].direction) {
            None => Some(SortDirection::Ascending),
            Some(SortDirection::Ascending) => Some(SortDirection::Descending),
            Some(SortDirection::Descending) => None,
        };

        if multi {
            match (idx, next) {
                (Some(i), None) => {
                    self.keys.remove(i);
                }
                (Some(i), Some(dir)) => self.keys[i].direction = dir,
                (None, _) => self.keys.push(SortKey::ascending(field)),
            }
        } else if idx.is_some() && self.keys.len() == 1 {
            match next {
                None => self.keys.clear(),
                Some(dir) => self.keys[0].direction = dir,
            }
        } else {
            self.keys = vec![SortKey::ascending(field)];
        }

        debug!(target: "sort", "cycle {} -> {}", field, self.request_param());
    }

    /// Request-parameter encoding: `field1:ASC,field2:DESC`, list order.
    pub fn request_param(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{}:{}", k.field, k.direction))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Human-readable form, e.g. `book ASC, trader DESC`.
    pub fn describe(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{} {}", k.field, k.direction))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn indicator(&self, field: &str) -> Option<SortIndicator> {
        let idx = self.keys.iter().position(|k| k.field == field)?;
        Some(SortIndicator {
            direction: self.keys[idx].direction,
            rank: (self.keys.len() > 1).then_some(idx + 1),
        })
    }
}

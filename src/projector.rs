use std::collections::HashSet;

use serde_json::Value;

/// Keys starting with this prefix are internal and never surfaced to the
/// detail or column views.
pub const RESERVED_PREFIX: char = '_';

/// Cutoff for opportunistic re-parsing of nested JSON strings. Record
/// payloads are uncontrolled third-party data; without a cutoff a chain of
/// string-encoded objects could recurse without bound.
pub const MAX_PARSE_DEPTH: usize = 16;

/// Derives flattened field paths from semi-structured record payloads and
/// resolves dotted paths against individual records.
///
/// Every failure mode here degrades gracefully: strings that do not parse
/// stay strings, paths that do not resolve yield `None`.
#[derive(Debug, Clone)]
pub struct ColumnProjector {
    max_depth: usize,
    placeholder: String,
}

impl Default for ColumnProjector {
    fn default() -> Self {
        Self {
            max_depth: MAX_PARSE_DEPTH,
            placeholder: "-".to_string(),
        }
    }
}

impl ColumnProjector {
    pub fn new(max_depth: usize, placeholder: impl Into<String>) -> Self {
        Self {
            max_depth,
            placeholder: placeholder.into(),
        }
    }

    /// Flatten records into leaf paths (`a.b.c`), first-encounter order,
    /// de-duplicated across records.
    ///
    /// String values that look like serialized objects or arrays are parsed
    /// before classification; objects are descended into, arrays and
    /// everything else are leaves. Reserved keys are skipped.
    pub fn flatten(&self, records: &[&Value]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for record in records {
            if let Some(obj) = record.as_object() {
                self.flatten_into(obj, "", 0, &mut seen, &mut paths);
            }
        }
        paths
    }

    fn flatten_into(
        &self,
        obj: &serde_json::Map<String, Value>,
        prefix: &str,
        depth: usize,
        seen: &mut HashSet<String>,
        paths: &mut Vec<String>,
    ) {
        for (key, value) in obj {
            if key.starts_with(RESERVED_PREFIX) {
                continue;
            }
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };

            let reparsed = if depth < self.max_depth {
                reparse(value)
            } else {
                None
            };
            let effective = reparsed.as_ref().unwrap_or(value);

            match effective.as_object() {
                Some(nested) if depth < self.max_depth => {
                    self.flatten_into(nested, &path, depth + 1, seen, paths);
                }
                _ => {
                    if seen.insert(path.clone()) {
                        paths.push(path);
                    }
                }
            }
        }
    }

    /// Paths not already covered by a declared column: the genuinely new
    /// ones to surface as dynamic columns.
    pub fn project(&self, records: &[&Value], static_fields: &[String]) -> Vec<String> {
        let declared: HashSet<&str> = static_fields.iter().map(String::as_str).collect();
        self.flatten(records)
            .into_iter()
            .filter(|path| !declared.contains(path.as_str()))
            .collect()
    }

    /// Walk a dotted path through one record, re-parsing serialized JSON
    /// segments along the way. `None` when any segment is missing or the
    /// walk lands on a non-object before the path is exhausted.
    pub fn resolve(&self, record: &Value, path: &str) -> Option<Value> {
        let mut current = record.clone();
        for segment in path.split('.') {
            if let Some(reparsed) = reparse(&current) {
                current = reparsed;
            }
            match current {
                Value::Object(ref map) => {
                    current = map.get(segment)?.clone();
                }
                _ => return None,
            }
        }
        Some(current)
    }

    /// Display rule for resolved values: missing/null render as the
    /// placeholder dash, object-typed leaves as their serialized form,
    /// everything else as literal text.
    pub fn display(&self, value: Option<&Value>) -> String {
        match value {
            None | Some(Value::Null) => self.placeholder.clone(),
            Some(Value::String(s)) => s.clone(),
            Some(v @ (Value::Object(_) | Value::Array(_))) => v.to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Ordered `(label, display)` pairs for the detail panel: nested objects
    /// flatten into dotted labels, reserved keys are dropped.
    pub fn detail_fields(&self, record: &Value) -> Vec<(String, String)> {
        let mut items = Vec::new();
        if let Some(obj) = record.as_object() {
            self.detail_into(obj, "", 0, &mut items);
        }
        items
    }

    fn detail_into(
        &self,
        obj: &serde_json::Map<String, Value>,
        prefix: &str,
        depth: usize,
        items: &mut Vec<(String, String)>,
    ) {
        for (key, value) in obj {
            if key.starts_with(RESERVED_PREFIX) {
                continue;
            }
            let label = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };

            let reparsed = if depth < self.max_depth {
                reparse(value)
            } else {
                None
            };
            let effective = reparsed.as_ref().unwrap_or(value);

            match effective.as_object() {
                Some(nested) if depth < self.max_depth => {
                    self.detail_into(nested, &label, depth + 1, items);
                }
                _ => items.push((label, self.display(Some(value)))),
            }
        }
    }
}

/// Opportunistically parse a string that looks like serialized JSON.
/// Anything else, including parse failures, yields `None`.
fn reparse(value: &Value) -> Option<Value> {
    let s = value.as_str()?;
    let trimmed = s.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(trimmed).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_descends_serialized_json_strings() {
        let record = json!({"a": "{\"b\":1}"});
        let projector = ColumnProjector::default();
        assert_eq!(projector.flatten(&[&record]), vec!["a.b"]);
        assert_eq!(projector.resolve(&record, "a.b"), Some(json!(1)));
    }

    #[test]
    fn flatten_treats_arrays_as_leaves() {
        let record = json!({"tags": [1, 2], "enc": "[3,4]", "obj": {"x": true}});
        let projector = ColumnProjector::default();
        assert_eq!(projector.flatten(&[&record]), vec!["tags", "enc", "obj.x"]);
    }

    #[test]
    fn flatten_skips_reserved_keys_and_dedupes_across_records() {
        let a = json!({"_internal": 1, "id": 7, "meta": {"src": "x"}});
        let b = json!({"id": 8, "meta": {"src": "y", "ts": 3}});
        let projector = ColumnProjector::default();
        assert_eq!(
            projector.flatten(&[&a, &b]),
            vec!["id", "meta.src", "meta.ts"]
        );
    }

    #[test]
    fn flatten_keeps_unparseable_strings_as_leaves() {
        let record = json!({"broken": "{not json", "plain": "text"});
        let projector = ColumnProjector::default();
        assert_eq!(projector.flatten(&[&record]), vec!["broken", "plain"]);
    }

    #[test]
    fn flatten_stops_at_the_depth_cutoff() {
        // Each level re-encodes the next one as a string.
        let mut payload = "1".to_string();
        for _ in 0..40 {
            payload = serde_json::to_string(&json!({ "n": payload })).unwrap();
        }
        let record = json!({ "deep": payload });
        let projector = ColumnProjector::default();
        let paths = projector.flatten(&[&record]);
        assert_eq!(paths.len(), 1);
        let segments = paths[0].split('.').count();
        assert!(segments <= MAX_PARSE_DEPTH + 1, "ran away: {}", paths[0]);
    }

    #[test]
    fn project_excludes_declared_columns() {
        let record = json!({"id": 1, "extra": {"score": 2}});
        let projector = ColumnProjector::default();
        let new = projector.project(&[&record], &["id".to_string()]);
        assert_eq!(new, vec!["extra.score"]);
    }

    #[test]
    fn resolve_fails_cleanly_on_missing_or_scalar_segments() {
        let record = json!({"a": {"b": 1}, "s": "plain"});
        let projector = ColumnProjector::default();
        assert_eq!(projector.resolve(&record, "a.missing"), None);
        assert_eq!(projector.resolve(&record, "s.x"), None);
        assert_eq!(projector.resolve(&record, "a.b.c"), None);
    }

    #[test]
    fn display_rules() {
        let projector = ColumnProjector::default();
        assert_eq!(projector.display(None), "-");
        assert_eq!(projector.display(Some(&Value::Null)), "-");
        assert_eq!(projector.display(Some(&json!("txt"))), "txt");
        assert_eq!(projector.display(Some(&json!(4.5))), "4.5");
        assert_eq!(projector.display(Some(&json!({"a":1}))), "{\"a\":1}");
    }

    #[test]
    fn detail_fields_flatten_with_dotted_labels() {
        let record = json!({
            "_id": 9,
            "name": "Alice",
            "risk": "{\"limit\":100,\"used\":null}"
        });
        let projector = ColumnProjector::default();
        assert_eq!(
            projector.detail_fields(&record),
            vec![
                ("name".to_string(), "Alice".to_string()),
                ("risk.limit".to_string(), "100".to_string()),
                ("risk.used".to_string(), "-".to_string()),
            ]
        );
    }
}

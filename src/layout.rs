use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::sort::{SortEngine, SortKey};
use crate::storage::SettingsBackend;
use crate::table::{ColumnId, TableState};

/// Namespace prefix for persisted layout blobs.
pub const SETTINGS_KEY_PREFIX: &str = "dg_settings_v1_";

/// Persisted per-column layout entry. Columns absent from the blob default
/// to visible with unset width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSettings {
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            visible: true,
            width: None,
        }
    }
}

/// The persisted layout blob for one resource.
///
/// Every field is optional on the wire so older blobs stay readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridSettings {
    #[serde(deserialize_with = "lenient_sort_keys")]
    pub sort: Vec<SortKey>,
    /// Page size, kept as the string the host form carries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    pub columns: BTreeMap<ColumnId, ColumnSettings>,
    pub column_order: Vec<ColumnId>,
}

/// Older blobs stored a single sort object where an array is expected;
/// coerce it into a one-element list instead of failing the whole load.
fn lenient_sort_keys<'de, D>(deserializer: D) -> Result<Vec<SortKey>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<SortKey>),
        One(SortKey),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(keys)) => keys,
        Some(OneOrMany::One(key)) => vec![key],
    })
}

/// Serializes and restores layout state through a [`SettingsBackend`].
///
/// Persistence is keyed by a resource identifier supplied by the hosting
/// page; without one, saves are silent no-ops and loads find nothing.
pub struct LayoutStore {
    backend: Box<dyn SettingsBackend>,
    namespace: String,
}

impl LayoutStore {
    pub fn new(backend: Box<dyn SettingsBackend>) -> Self {
        Self {
            backend,
            namespace: SETTINGS_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    fn key(&self, resource: &str) -> String {
        format!("{}{}", self.namespace, resource)
    }

    pub fn save(&mut self, resource: Option<&str>, settings: &GridSettings) {
        let Some(resource) = resource else {
            return;
        };
        match serde_json::to_string(settings) {
            Ok(blob) => self.backend.set(&self.key(resource), &blob),
            Err(e) => warn!(target: "layout", "Could not serialize settings: {}", e),
        }
    }

    /// Corrupt blobs behave as absent: logged, never surfaced to the caller.
    pub fn load(&self, resource: Option<&str>) -> Option<GridSettings> {
        let resource = resource?;
        let raw = self.backend.get(&self.key(resource))?;
        match serde_json::from_str(&raw) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!(target: "layout", "Load settings failed for {}: {}", resource, e);
                None
            }
        }
    }

    /// Capture the current layout of a live table plus the active sort.
    pub fn snapshot(table: &TableState, sort: &SortEngine, limit: Option<String>) -> GridSettings {
        let mut settings = GridSettings {
            sort: sort.keys().to_vec(),
            limit,
            ..GridSettings::default()
        };
        for col in table.ordered_columns() {
            settings.column_order.push(col.id.clone());
            settings.columns.insert(
                col.id.clone(),
                ColumnSettings {
                    visible: col.visible,
                    width: col.width.clone(),
                },
            );
        }
        settings
    }

    /// Apply a persisted layout to a live table.
    ///
    /// Order: each column named in `column_order` is moved to the end of the
    /// display order in sequence, so unnamed columns keep their relative
    /// position ahead of the ordered ones. Visibility: a persisted
    /// `visible=false` hides, everything else (including unseen columns) is
    /// shown. Widths apply where persisted. Unknown persisted entries are
    /// ignored; unknown live columns are left at their defaults. Re-applying
    /// the same settings is a no-op.
    pub fn apply(settings: &GridSettings, table: &mut TableState) {
        for id in &settings.column_order {
            table.move_to_end(id);
        }

        let ids: Vec<ColumnId> = table.ordered_columns().map(|c| c.id.clone()).collect();
        for id in ids {
            match settings.columns.get(&id) {
                Some(cfg) => {
                    table.set_visible(&id, cfg.visible);
                    if let Some(width) = &cfg.width {
                        table.set_width(&id, Some(width.clone()));
                    }
                }
                None => {
                    table.set_visible(&id, true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortDirection;
    use crate::storage::MemoryBackend;
    use crate::table::Column;

    fn table() -> TableState {
        TableState::new(vec![
            Column::new("col-id", "id", "Id"),
            Column::new("col-book", "book", "Book"),
            Column::new("col-qty", "qty", "Quantity"),
        ])
    }

    fn order(table: &TableState) -> Vec<&str> {
        table.ordered_columns().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn save_without_resource_is_a_no_op() {
        let mut store = LayoutStore::new(Box::new(MemoryBackend::new()));
        store.save(None, &GridSettings::default());
        assert_eq!(store.load(None), None);
        assert_eq!(store.load(Some("trades")), None);
    }

    #[test]
    fn save_load_round_trip() {
        let mut store = LayoutStore::new(Box::new(MemoryBackend::new()));
        let mut settings = GridSettings::default();
        settings.sort.push(SortKey::ascending("book"));
        settings.limit = Some("50".to_string());
        settings.column_order.push(ColumnId::new("col-book"));
        store.save(Some("trades"), &settings);

        assert_eq!(store.load(Some("trades")), Some(settings));
        assert_eq!(store.load(Some("other")), None);
    }

    #[test]
    fn corrupt_blob_behaves_as_absent() {
        let mut backend = MemoryBackend::new();
        backend.set("dg_settings_v1_trades", "{not json");
        let store = LayoutStore::new(Box::new(backend));
        assert_eq!(store.load(Some("trades")), None);
    }

    #[test]
    fn single_sort_object_is_coerced_to_a_list() {
        let raw = r#"{"sort": {"field": "book", "dir": "DESC"}, "limit": "20"}"#;
        let settings: GridSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.sort.len(), 1);
        assert_eq!(settings.sort[0].field, "book");
        assert_eq!(settings.sort[0].direction, SortDirection::Descending);
    }

    #[test]
    fn missing_fields_read_as_defaults() {
        let settings: GridSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.sort.is_empty());
        assert_eq!(settings.limit, None);
        assert!(settings.columns.is_empty());
        assert!(settings.column_order.is_empty());
    }

    #[test]
    fn apply_reorders_hides_and_sizes() {
        let mut t = table();
        let mut settings = GridSettings::default();
        settings.column_order = vec![ColumnId::new("col-qty"), ColumnId::new("col-id")];
        settings.columns.insert(
            ColumnId::new("col-book"),
            ColumnSettings {
                visible: false,
                width: None,
            },
        );
        settings.columns.insert(
            ColumnId::new("col-qty"),
            ColumnSettings {
                visible: true,
                width: Some("90px".to_string()),
            },
        );

        LayoutStore::apply(&settings, &mut t);
        assert_eq!(order(&t), vec!["col-book", "col-qty", "col-id"]);
        assert!(!t.column(&ColumnId::new("col-book")).unwrap().visible);
        assert_eq!(
            t.column(&ColumnId::new("col-qty")).unwrap().width.as_deref(),
            Some("90px")
        );
    }

    #[test]
    fn apply_is_idempotent() {
        let mut t = table();
        let mut settings = GridSettings::default();
        settings.column_order = vec![ColumnId::new("col-book")];
        settings.columns.insert(
            ColumnId::new("col-id"),
            ColumnSettings {
                visible: false,
                width: Some("40px".to_string()),
            },
        );

        LayoutStore::apply(&settings, &mut t);
        let once = order(&t)
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        LayoutStore::apply(&settings, &mut t);
        assert_eq!(order(&t), once);
    }

    #[test]
    fn apply_tolerates_schema_drift() {
        let mut t = table();
        let mut settings = GridSettings::default();
        // Persisted layout references a column that no longer exists.
        settings.column_order = vec![ColumnId::new("col-gone"), ColumnId::new("col-id")];
        settings.columns.insert(
            ColumnId::new("col-gone"),
            ColumnSettings {
                visible: false,
                width: None,
            },
        );

        LayoutStore::apply(&settings, &mut t);
        assert_eq!(order(&t), vec!["col-book", "col-qty", "col-id"]);
        // Live columns the blob never saw are shown.
        assert!(t.column(&ColumnId::new("col-book")).unwrap().visible);
    }

    #[test]
    fn apply_reshows_columns_unseen_by_the_blob() {
        let mut t = table();
        t.set_visible(&ColumnId::new("col-qty"), false);
        LayoutStore::apply(&GridSettings::default(), &mut t);
        assert!(t.column(&ColumnId::new("col-qty")).unwrap().visible);
    }

    #[test]
    fn snapshot_captures_display_order_and_widths() {
        let mut t = table();
        t.move_to_end(&ColumnId::new("col-id"));
        t.set_visible(&ColumnId::new("col-book"), false);
        t.set_width(&ColumnId::new("col-qty"), Some("120px".to_string()));

        let mut sort = SortEngine::new();
        sort.cycle("qty", false);

        let settings = LayoutStore::snapshot(&t, &sort, Some("20".to_string()));
        assert_eq!(
            settings.column_order,
            vec![
                ColumnId::new("col-book"),
                ColumnId::new("col-qty"),
                ColumnId::new("col-id"),
            ]
        );
        assert!(!settings.columns[&ColumnId::new("col-book")].visible);
        assert_eq!(
            settings.columns[&ColumnId::new("col-qty")].width.as_deref(),
            Some("120px")
        );
        assert_eq!(settings.sort, vec![SortKey::ascending("qty")]);
    }
}

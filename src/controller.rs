use tracing::debug;

use crate::config::EngineConfig;
use crate::layout::LayoutStore;
use crate::projector::ColumnProjector;
use crate::sort::{SortEngine, SortIndicator};
use crate::storage::SettingsBackend;
use crate::table::{Column, ColumnId, TableState};

/// External refresh primitive: the engine signals "content must be
/// refetched" with the serialized sort spec attached, fire-and-forget.
pub trait RefreshSink {
    fn request_refresh(&mut self, params: &[(&str, String)]);
}

/// Sink for hosts without a refresh mechanism (and for tests that only
/// inspect state).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRefreshSink;

impl RefreshSink for NullRefreshSink {
    fn request_refresh(&mut self, _params: &[(&str, String)]) {}
}

/// Keyboard modifiers of a header click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickModifiers {
    pub ctrl: bool,
    pub shift: bool,
}

/// Pagination metadata mirrored from the content-replacement event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageState {
    pub limit: usize,
    pub offset: usize,
    pub total: usize,
}

impl PageState {
    pub fn prev_enabled(&self) -> bool {
        self.offset > 0
    }

    pub fn next_enabled(&self) -> bool {
        self.offset + self.limit < self.total
    }
}

/// Column-chooser entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChooserEntry {
    pub id: ColumnId,
    pub label: String,
    pub visible: bool,
}

/// In-flight column-resize gesture. Widths are always computed from the
/// captured start position so repeated move events cannot drift.
#[derive(Debug, Clone)]
struct ResizeGesture {
    column: ColumnId,
    start_x: i32,
    start_width: u32,
}

/// Session-scoped owner of all mutable grid state: active sort, live table
/// layout, pagination, resize gesture, chooser state.
///
/// Single-threaded and synchronous; every operation runs to completion
/// inside one interaction callback. Persistence writes are last-write-wins
/// and safe to issue redundantly.
pub struct GridController {
    config: EngineConfig,
    resource: Option<String>,
    store: LayoutStore,
    sort: SortEngine,
    projector: ColumnProjector,
    table: TableState,
    page: PageState,
    resize: Option<ResizeGesture>,
    chooser_dirty: bool,
    mounted: bool,
    sink: Box<dyn RefreshSink>,
}

impl GridController {
    /// `resource` keys persistence; without one, layout state lives only
    /// for the session.
    pub fn new(
        config: EngineConfig,
        resource: Option<String>,
        backend: Box<dyn SettingsBackend>,
        sink: Box<dyn RefreshSink>,
    ) -> Self {
        let store =
            LayoutStore::new(backend).with_namespace(config.persistence.namespace.clone());
        let projector = ColumnProjector::new(
            config.projector.max_parse_depth,
            config.projector.placeholder.clone(),
        );
        let page = PageState {
            limit: config.paging.default_limit,
            ..PageState::default()
        };
        Self {
            config,
            resource,
            store,
            sort: SortEngine::new(),
            projector,
            table: TableState::default(),
            page,
            resize: None,
            chooser_dirty: false,
            mounted: false,
            sink,
        }
    }

    /// Restore persisted sort and page size. Idempotent; called once by the
    /// host when the view first appears.
    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        if let Some(settings) = self.store.load(self.resource.as_deref()) {
            self.sort.set_keys(settings.sort);
            if let Some(limit) = settings.limit.and_then(|l| l.parse().ok()) {
                self.page.limit = limit;
            }
        }
        self.mounted = true;
    }

    pub fn unmount(&mut self) {
        self.mounted = false;
        self.resize = None;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Content-replacement notification: adopt the freshly rendered table
    /// and its pagination metadata, then re-apply the persisted layout.
    /// Safe to call at any time, including mid-gesture.
    pub fn content_replaced(&mut self, mut table: TableState, page: PageState) {
        self.page = page;
        self.resize = None;
        if let Some(settings) = self.store.load(self.resource.as_deref()) {
            LayoutStore::apply(&settings, &mut table);
        }
        self.table = table;
        self.chooser_dirty = true;
        debug!(target: "grid", "Content replaced: {} rows, offset {}/{}",
            self.table.row_count(), self.page.offset, self.page.total);
    }

    pub fn table(&self) -> &TableState {
        &self.table
    }

    pub fn page(&self) -> PageState {
        self.page
    }

    pub fn sort_keys(&self) -> &SortEngine {
        &self.sort
    }

    pub fn sort_indicator(&self, field: &str) -> Option<SortIndicator> {
        self.sort.indicator(field)
    }

    /// One header click. Shift hides the column (taking precedence over
    /// ctrl and suppressing the sort transition); otherwise the field's
    /// sort state cycles, ctrl keeping the other keys.
    pub fn header_click(&mut self, field: &str, modifiers: ClickModifiers) {
        let Some(column) = self.table.column_by_field(field) else {
            return;
        };
        if !column.sortable {
            return;
        }

        if modifiers.shift {
            let id = column.id.clone();
            self.table.set_visible(&id, false);
            self.chooser_dirty = true;
            self.persist();
            return;
        }

        self.sort.cycle(field, modifiers.ctrl);
        self.persist();
        self.refresh();
    }

    /// Chooser entries in display order. Rebuilding them clears the dirty
    /// flag set by shift-hide.
    pub fn chooser_entries(&mut self) -> Vec<ChooserEntry> {
        self.chooser_dirty = false;
        self.table
            .ordered_columns()
            .map(|c| ChooserEntry {
                id: c.id.clone(),
                label: c.label.clone(),
                visible: c.visible,
            })
            .collect()
    }

    pub fn is_chooser_dirty(&self) -> bool {
        self.chooser_dirty
    }

    pub fn set_column_visible(&mut self, id: &ColumnId, visible: bool) {
        if self.table.set_visible(id, visible) {
            self.persist();
        }
    }

    /// Drag-and-drop reorder: `dragged` lands after `target` when dragged
    /// from the left, before it otherwise.
    pub fn drop_column(&mut self, dragged: &ColumnId, target: &ColumnId) {
        if self.table.move_next_to(dragged, target) {
            self.chooser_dirty = true;
            self.persist();
        }
    }

    /// Step to the next configured page size, reset to the first page,
    /// persist, refetch. Returns the new size.
    pub fn cycle_page_size(&mut self) -> usize {
        let sizes = &self.config.paging.sizes;
        if sizes.is_empty() {
            return self.page.limit;
        }
        let current = sizes.iter().position(|&s| s == self.page.limit);
        let next = match current {
            Some(i) => sizes[(i + 1) % sizes.len()],
            None => sizes[0],
        };
        self.page.limit = next;
        self.page.offset = 0;
        self.persist();
        self.refresh();
        next
    }

    pub fn prev_page(&mut self) -> bool {
        if !self.page.prev_enabled() {
            return false;
        }
        self.page.offset = self.page.offset.saturating_sub(self.page.limit);
        self.refresh();
        true
    }

    pub fn next_page(&mut self) -> bool {
        if !self.page.next_enabled() {
            return false;
        }
        self.page.offset += self.page.limit;
        self.refresh();
        true
    }

    /// Begin a resize gesture. `start_width` is the rendered width measured
    /// by the host at the "down" event.
    pub fn resize_begin(&mut self, id: &ColumnId, x: i32, start_width: u32) {
        if self.table.column(id).is_none() {
            return;
        }
        self.resize = Some(ResizeGesture {
            column: id.clone(),
            start_x: x,
            start_width,
        });
    }

    /// Each move recomputes from the gesture's fixed start, never from the
    /// previous frame. Moves after the gesture ended are ignored.
    pub fn resize_move(&mut self, x: i32) {
        let Some(gesture) = &self.resize else {
            return;
        };
        let delta = i64::from(x) - i64::from(gesture.start_x);
        let width = (i64::from(gesture.start_width) + delta).max(0);
        let column = gesture.column.clone();
        self.table.set_width(&column, Some(format!("{width}px")));
    }

    /// Commit and persist exactly once at the terminating "up" event.
    pub fn resize_end(&mut self) {
        if self.resize.take().is_some() {
            self.persist();
        }
    }

    /// Surface leaf paths found in record payloads but not declared as
    /// columns, appending one dynamic column per new path. Returns how many
    /// were added.
    pub fn inject_dynamic_columns(&mut self) -> usize {
        let mut declared = self.table.fields();
        declared.extend(
            self.table
                .fields()
                .iter()
                .filter_map(|f| f.strip_prefix("dyn-").map(str::to_string)),
        );

        let additions: Vec<(Column, Vec<String>)> = {
            let records = self.table.records();
            self.projector
                .project(&records, &declared)
                .into_iter()
                .map(|path| {
                    let cells: Vec<String> = self
                        .table
                        .rows()
                        .iter()
                        .map(|row| {
                            let value = row
                                .record
                                .as_ref()
                                .and_then(|rec| self.projector.resolve(rec, &path));
                            self.projector.display(value.as_ref())
                        })
                        .collect();
                    let mut column = Column::new(
                        format!("col-dyn-{path}"),
                        format!("dyn-{path}"),
                        path.clone(),
                    );
                    column.sortable = false;
                    (column, cells)
                })
                .collect()
        };

        let added = additions.len();
        for (column, cells) in additions {
            self.table.append_column(column, cells);
        }
        if added > 0 {
            self.chooser_dirty = true;
            debug!(target: "grid", "Injected {} dynamic columns", added);
        }
        added
    }

    /// Detail-panel fields for one row's record payload.
    pub fn detail_fields(&self, row_index: usize) -> Vec<(String, String)> {
        self.table
            .rows()
            .get(row_index)
            .and_then(|row| row.record.as_ref())
            .map(|record| self.projector.detail_fields(record))
            .unwrap_or_default()
    }

    fn persist(&mut self) {
        let settings = LayoutStore::snapshot(
            &self.table,
            &self.sort,
            Some(self.page.limit.to_string()),
        );
        self.store.save(self.resource.as_deref(), &settings);
    }

    fn refresh(&mut self) {
        self.sink
            .request_refresh(&[("sort", self.sort.request_param())]);
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::trace;

use crate::domain::{ColumnKey, SortDirection, column};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: ColumnKey,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
}

impl Pagination {
    /// Number of local pages for `count` rows. An empty set still has one page.
    pub fn page_count(&self, count: usize) -> usize {
        count.div_ceil(self.page_size).max(1)
    }

    pub fn clamp(&self, index: usize, count: usize) -> usize {
        index.min(self.page_count(count) - 1)
    }
}

/// Snapshot of all user controlled display parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub sorting: Vec<SortKey>,
    pub column_filters: BTreeMap<ColumnKey, String>,
    pub global_filter: String,
    pub visibility: BTreeMap<ColumnKey, bool>,
    pub selection: BTreeSet<u64>,
    pub pagination: Pagination,
}

impl ViewState {
    pub fn new(page_size: usize) -> Self {
        Self {
            sorting: Vec::new(),
            column_filters: BTreeMap::new(),
            global_filter: String::new(),
            visibility: BTreeMap::new(),
            selection: BTreeSet::new(),
            pagination: Pagination {
                page_index: 0,
                page_size: page_size.max(1),
            },
        }
    }

    pub fn is_visible(&self, key: ColumnKey) -> bool {
        self.visibility.get(&key).copied().unwrap_or(true)
    }

    pub fn sort_direction(&self, key: ColumnKey) -> Option<SortDirection> {
        self.sorting
            .iter()
            .find(|s| s.column == key)
            .map(|s| s.direction)
    }

    pub fn is_selected(&self, id: u64) -> bool {
        self.selection.contains(&id)
    }
}

/// Holds the current [`ViewState`]. Every mutator swaps in a new snapshot,
/// so snapshots handed out earlier stay untouched.
#[derive(Debug, Clone)]
pub struct ViewStateStore {
    current: Arc<ViewState>,
}

impl ViewStateStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            current: Arc::new(ViewState::new(page_size)),
        }
    }

    pub fn snapshot(&self) -> Arc<ViewState> {
        Arc::clone(&self.current)
    }

    pub fn get(&self) -> &ViewState {
        &self.current
    }

    fn apply(&mut self, change: impl FnOnce(&mut ViewState)) {
        let mut next = ViewState::clone(&self.current);
        change(&mut next);
        self.current = Arc::new(next);
    }

    /// Cycles the sort of `key`: ascending, descending, unsorted.
    /// Sorting a different column starts over with ascending.
    pub fn set_sort(&mut self, key: ColumnKey) {
        if !column(key).sortable {
            return;
        }
        self.apply(|state| {
            state.sorting = match state.sorting.as_slice() {
                [only] if only.column == key => match only.direction {
                    SortDirection::Ascending => vec![SortKey {
                        column: key,
                        direction: SortDirection::Descending,
                    }],
                    SortDirection::Descending => Vec::new(),
                },
                _ => vec![SortKey {
                    column: key,
                    direction: SortDirection::Ascending,
                }],
            };
            trace!("Sorting: {:?}", state.sorting);
        });
    }

    pub fn set_sort_direction(&mut self, key: ColumnKey, direction: SortDirection) {
        if !column(key).sortable {
            return;
        }
        self.apply(|state| {
            state.sorting = vec![SortKey {
                column: key,
                direction,
            }]
        });
    }

    pub fn set_global_filter(&mut self, text: &str) {
        self.apply(|state| {
            state.global_filter = text.to_string();
            state.pagination.page_index = 0;
        });
    }

    /// Sets the filter of one column. An empty text removes it.
    pub fn set_column_filter(&mut self, key: ColumnKey, text: &str) {
        if !column(key).filterable {
            return;
        }
        self.apply(|state| {
            if text.is_empty() {
                state.column_filters.remove(&key);
            } else {
                state.column_filters.insert(key, text.to_string());
            }
            state.pagination.page_index = 0;
        });
    }

    pub fn clear_filters(&mut self) {
        self.apply(|state| {
            state.column_filters.clear();
            state.global_filter.clear();
            state.pagination.page_index = 0;
        });
    }

    pub fn set_column_visibility(&mut self, key: ColumnKey, visible: bool) {
        if !visible && !column(key).hideable {
            return;
        }
        self.apply(|state| {
            state.visibility.insert(key, visible);
        });
    }

    pub fn show_all_columns(&mut self) {
        self.apply(|state| state.visibility.clear());
    }

    pub fn toggle_row_selection(&mut self, id: u64) {
        self.apply(|state| {
            if !state.selection.remove(&id) {
                state.selection.insert(id);
            }
        });
    }

    /// Selects or deselects the rows currently shown. Selection of other rows is kept.
    pub fn toggle_all_visible_selected(&mut self, selected: bool, visible: &[u64]) {
        self.apply(|state| {
            for id in visible {
                if selected {
                    state.selection.insert(*id);
                } else {
                    state.selection.remove(id);
                }
            }
        });
    }

    pub fn clear_selection(&mut self) {
        if self.current.selection.is_empty() {
            return;
        }
        self.apply(|state| state.selection.clear());
    }

    /// Moves to local page `index`, clamped to the pages available for `filtered_count` rows.
    pub fn set_page_index(&mut self, index: usize, filtered_count: usize) {
        self.apply(|state| {
            state.pagination.page_index = state.pagination.clamp(index, filtered_count);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_cycles_through_directions() {
        let mut store = ViewStateStore::new(5);
        store.set_sort(ColumnKey::Name);
        assert_eq!(
            store.get().sort_direction(ColumnKey::Name),
            Some(SortDirection::Ascending)
        );
        store.set_sort(ColumnKey::Name);
        assert_eq!(
            store.get().sort_direction(ColumnKey::Name),
            Some(SortDirection::Descending)
        );
        store.set_sort(ColumnKey::Name);
        assert!(store.get().sorting.is_empty());
    }

    #[test]
    fn sorting_another_column_replaces_sort() {
        let mut store = ViewStateStore::new(5);
        store.set_sort(ColumnKey::Name);
        store.set_sort(ColumnKey::Name);
        store.set_sort(ColumnKey::Email);
        assert_eq!(
            store.get().sorting,
            vec![SortKey {
                column: ColumnKey::Email,
                direction: SortDirection::Ascending
            }]
        );
    }

    #[test]
    fn selection_column_is_not_sortable_or_hideable() {
        let mut store = ViewStateStore::new(5);
        store.set_sort(ColumnKey::Select);
        store.set_column_visibility(ColumnKey::Select, false);
        store.set_column_filter(ColumnKey::Select, "x");
        assert!(store.get().sorting.is_empty());
        assert!(store.get().is_visible(ColumnKey::Select));
        assert!(store.get().column_filters.is_empty());
    }

    #[test]
    fn mutators_leave_old_snapshots_untouched() {
        let mut store = ViewStateStore::new(5);
        let before = store.snapshot();
        store.set_global_filter("jo");
        assert_eq!(before.global_filter, "");
        assert_eq!(store.get().global_filter, "jo");
    }

    #[test]
    fn visibility_defaults_to_true() {
        let mut store = ViewStateStore::new(5);
        assert!(store.get().is_visible(ColumnKey::Email));
        store.set_column_visibility(ColumnKey::Email, false);
        assert!(!store.get().is_visible(ColumnKey::Email));
        store.show_all_columns();
        assert!(store.get().is_visible(ColumnKey::Email));
    }

    #[test]
    fn selection_toggles() {
        let mut store = ViewStateStore::new(5);
        store.toggle_row_selection(3);
        assert!(store.get().is_selected(3));
        store.toggle_row_selection(3);
        assert!(!store.get().is_selected(3));

        store.toggle_row_selection(9);
        store.toggle_all_visible_selected(true, &[1, 2]);
        assert_eq!(store.get().selection, BTreeSet::from([1, 2, 9]));
        store.toggle_all_visible_selected(false, &[1, 2]);
        assert_eq!(store.get().selection, BTreeSet::from([9]));
        store.clear_selection();
        assert!(store.get().selection.is_empty());
    }

    #[test]
    fn page_index_is_clamped() {
        let mut store = ViewStateStore::new(5);
        store.set_page_index(7, 12);
        assert_eq!(store.get().pagination.page_index, 2);
        store.set_page_index(3, 0);
        assert_eq!(store.get().pagination.page_index, 0);
    }

    #[test]
    fn filters_reset_page_index() {
        let mut store = ViewStateStore::new(5);
        store.set_page_index(1, 10);
        store.set_column_filter(ColumnKey::Email, "biz");
        assert_eq!(store.get().pagination.page_index, 0);
        store.set_column_filter(ColumnKey::Email, "");
        assert!(store.get().column_filters.is_empty());
    }
}

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::domain::{COLUMNS, ColumnKey, Record, SortDirection, column};
use crate::state::{SortKey, ViewState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub key: ColumnKey,
    pub title: &'static str,
    pub sort: Option<SortDirection>,
    pub sortable: bool,
    pub hideable: bool,
}

/// State of the "select all" checkbox relative to the rows on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Unchecked,
    Indeterminate,
    Checked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub columns: Vec<HeaderCell>,
    pub select_all: CheckState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u64,
    pub selected: bool,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowModel {
    pub header: Header,
    pub rows: Vec<Row>,
    pub total_filtered_count: usize,
    pub page_index: usize,
    pub page_count: usize,
}

impl RowModel {
    pub fn visible_ids(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.id).collect()
    }
}

/// Derives the rows to render: global filter, column filters, sort, page slice.
pub fn derive_rows(records: &[Record], state: &ViewState) -> RowModel {
    let filtered = filter_records(records, state);
    let sorted = sort_records(filtered, &state.sorting);

    let total_filtered_count = sorted.len();
    let pagination = state.pagination;
    let page_index = pagination.clamp(pagination.page_index, total_filtered_count);
    let begin = std::cmp::min(page_index * pagination.page_size, total_filtered_count);
    let end = std::cmp::min(begin + pagination.page_size, total_filtered_count);

    let visible_columns: Vec<ColumnKey> = COLUMNS
        .iter()
        .filter(|c| state.is_visible(c.key))
        .map(|c| c.key)
        .collect();

    let rows: Vec<Row> = sorted[begin..end]
        .iter()
        .map(|record| Row {
            id: record.id,
            selected: state.is_selected(record.id),
            cells: visible_columns
                .iter()
                .map(|&key| (column(key).render)(record).into_owned())
                .collect(),
        })
        .collect();

    let selected = rows.iter().filter(|r| r.selected).count();
    let select_all = match selected {
        0 => CheckState::Unchecked,
        n if n == rows.len() => CheckState::Checked,
        _ => CheckState::Indeterminate,
    };

    let header = Header {
        columns: visible_columns
            .iter()
            .map(|&key| {
                let descriptor = column(key);
                HeaderCell {
                    key,
                    title: descriptor.title,
                    sort: state.sort_direction(key),
                    sortable: descriptor.sortable,
                    hideable: descriptor.hideable,
                }
            })
            .collect(),
        select_all,
    };

    RowModel {
        header,
        rows,
        total_filtered_count,
        page_index,
        page_count: pagination.page_count(total_filtered_count),
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn matches_global(record: &Record, needle_lower: &str) -> bool {
    needle_lower.is_empty()
        || COLUMNS
            .iter()
            .filter(|c| c.filterable)
            .filter_map(|c| c.key.value(record))
            .any(|value| contains_ignore_case(value, needle_lower))
}

fn filter_records<'a>(records: &'a [Record], state: &ViewState) -> Vec<&'a Record> {
    let global = state.global_filter.to_lowercase();
    let column_filters: Vec<(ColumnKey, String)> = state
        .column_filters
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (*k, v.to_lowercase()))
        .collect();

    // rayon keeps the source order when collecting into a Vec.
    records
        .par_iter()
        .filter(|record| matches_global(record, &global))
        .filter(|record| {
            column_filters.iter().all(|(key, needle)| {
                key.value(record)
                    .is_some_and(|value| contains_ignore_case(value, needle))
            })
        })
        .collect()
}

/// Case-insensitive text order. Values equal up to case fall back to byte order.
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare(a: &Record, b: &Record, sorting: &[SortKey]) -> Ordering {
    for sort in sorting {
        let ordering = match (sort.column.value(a), sort.column.value(b)) {
            (Some(a), Some(b)) => compare_text(a, b),
            _ => Ordering::Equal,
        };
        let ordering = match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn sort_records<'a>(mut records: Vec<&'a Record>, sorting: &[SortKey]) -> Vec<&'a Record> {
    if !sorting.is_empty() {
        // sort_by is stable, equal keys keep their source order.
        records.sort_by(|a, b| compare(a, b, sorting));
    }
    records
}

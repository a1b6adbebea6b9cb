use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::domain::{
    CMDMode, ColumnKey, HELP_TEXT, Message, RVConfig, Record, SortDirection, column,
};
use crate::fetch::{Completion, FetchRequest, FetchTracker, LoadState};
use crate::inputter::{InputResult, Inputter};
use crate::navigation::PageNavigator;
use crate::pipeline::{CheckState, RowModel, derive_rows};
use crate::state::{ViewState, ViewStateStore};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

/// Everything the UI needs to draw one frame.
pub struct UIData<'a> {
    pub location: String,
    pub load_state: &'a LoadState,
    pub rows: &'a RowModel,
    pub view: Arc<ViewState>,
    pub page_size: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub can_previous: bool,
    pub can_next: bool,
    pub show_popup: bool,
    pub popup_message: &'static str,
    pub cmdinput: &'a InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: &'a str,
}

pub struct Model {
    config: RVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    store: ViewStateStore,
    tracker: FetchTracker,
    navigator: PageNavigator,
    pending: Option<FetchRequest>,
    rows: RowModel,
    curser_row: usize,
    curser_column: usize,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
}

impl Model {
    /// Creates the model and queues the fetch of the page named by `indicator`.
    pub fn init(config: &RVConfig, indicator: Option<&str>) -> Self {
        let store = ViewStateStore::new(config.page_size);
        let rows = derive_rows(&[], store.get());
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            store,
            tracker: FetchTracker::default(),
            navigator: PageNavigator::from_indicator(indicator),
            pending: None,
            rows,
            curser_row: 0,
            curser_column: 0,
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Started rv!".to_string(),
        };
        model.request_page(model.navigator.page());
        model
    }

    /// Hands the queued fetch over to the caller, who runs it and reports back with
    /// [`Message::Fetched`].
    pub fn take_fetch_request(&mut self) -> Option<FetchRequest> {
        self.pending.take()
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn row_model(&self) -> &RowModel {
        &self.rows
    }

    pub fn view_state(&self) -> &ViewState {
        self.store.get()
    }

    pub fn load_state(&self) -> &LoadState {
        self.tracker.state()
    }

    pub fn navigator(&self) -> &PageNavigator {
        &self.navigator
    }

    pub fn get_uidata(&self) -> UIData<'_> {
        UIData {
            location: self.navigator.location(),
            load_state: self.tracker.state(),
            rows: &self.rows,
            view: self.store.snapshot(),
            page_size: self.config.page_size,
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            can_previous: self.navigator.can_previous(),
            can_next: self.navigator.can_next(),
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT,
            cmdinput: &self.last_input,
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: &self.status_message,
        }
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn request_page(&mut self, page: usize) {
        let request = self.tracker.begin(page);
        if let Some(superseded) = self.pending.replace(request) {
            trace!("Request {superseded:?} superseded before it was started");
        }
        // Selection is scoped to the loaded page.
        self.store.clear_selection();
        self.set_status_message(format!("Loading page {page} ..."));
        self.refresh();
    }

    /// Re-derives the row model after any change of records or view state.
    fn refresh(&mut self) {
        self.rows = derive_rows(self.tracker.records(), self.store.get());
        self.curser_row = std::cmp::min(self.curser_row, self.rows.rows.len().saturating_sub(1));
        self.curser_column = std::cmp::min(
            self.curser_column,
            self.rows.header.columns.len().saturating_sub(1),
        );
        trace!(
            "Row model: {} rows, {} filtered, page {}/{}",
            self.rows.rows.len(),
            self.rows.total_filtered_count,
            self.rows.page_index + 1,
            self.rows.page_count
        );
    }

    fn current_column(&self) -> Option<ColumnKey> {
        self.rows
            .header
            .columns
            .get(self.curser_column)
            .map(|c| c.key)
    }

    fn current_row_id(&self) -> Option<u64> {
        self.rows.rows.get(self.curser_row).map(|r| r.id)
    }

    pub fn update(&mut self, message: Option<Message>) {
        let Some(msg) = message else {
            return;
        };

        if let Message::Fetched(completion) = msg {
            self.fetched(completion);
            return;
        }

        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.curser_row = self.curser_row.saturating_sub(1),
                Message::MoveDown => {
                    if self.curser_row + 1 < self.rows.rows.len() {
                        self.curser_row += 1;
                    }
                }
                Message::MoveLeft => self.curser_column = self.curser_column.saturating_sub(1),
                Message::MoveRight => {
                    if self.curser_column + 1 < self.rows.header.columns.len() {
                        self.curser_column += 1;
                    }
                }
                Message::PrevPage => self.previous_page(),
                Message::NextPage => self.next_page(),
                Message::PrevLocalPage => self.move_local_page(-1),
                Message::NextLocalPage => self.move_local_page(1),
                Message::ToggleSort => self.toggle_sort(),
                Message::SortAscending => self.sort_current_column(SortDirection::Ascending),
                Message::SortDescending => self.sort_current_column(SortDirection::Descending),
                Message::Search => self.enter_cmd_mode(CMDMode::SearchTable),
                Message::Filter => self.enter_cmd_mode(CMDMode::FilterByColumn),
                Message::ClearFilters => self.clear_filters(),
                Message::HideColumn => self.hide_current_column(),
                Message::ShowAllColumns => {
                    self.store.show_all_columns();
                    self.refresh();
                }
                Message::ToggleRowSelection => self.toggle_row_selection(),
                Message::ToggleSelectAll => self.toggle_select_all(),
                Message::CopyRows => self.copy_rows(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help => self.exit(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn fetched(&mut self, completion: Completion) {
        let page = self.navigator.page();
        let message = match self.tracker.complete(completion) {
            None => return,
            Some(LoadState::Success(result)) => {
                let (count, has_more) = (result.records.len(), result.has_more);
                self.navigator.record_success(has_more);
                format!("Loaded {count} records of page {page}")
            }
            Some(LoadState::Error(error)) => format!("Error: {error}"),
            Some(state) => {
                warn!("Unexpected state after completion: {state:?}");
                return;
            }
        };
        self.set_status_message(message);
        self.store.set_page_index(0, self.tracker.records().len());
        self.curser_row = 0;
        self.refresh();
    }

    fn previous_page(&mut self) {
        match self.navigator.previous_page() {
            Some(page) => self.request_page(page),
            None => self.set_status_message("Already on the first page"),
        }
    }

    fn next_page(&mut self) {
        match self.navigator.next_page() {
            Some(page) => self.request_page(page),
            None if self.tracker.state() == &LoadState::Loading => self.set_status_message(
                format!("Page {} is still loading", self.navigator.page()),
            ),
            None => self.set_status_message("No more pages"),
        }
    }

    fn move_local_page(&mut self, step: isize) {
        let index = self.rows.page_index.saturating_add_signed(step);
        self.store.set_page_index(index, self.rows.total_filtered_count);
        self.curser_row = 0;
        self.refresh();
    }

    fn toggle_sort(&mut self) {
        if let Some(key) = self.current_column() {
            self.store.set_sort(key);
            self.refresh();
        }
    }

    fn sort_current_column(&mut self, direction: SortDirection) {
        if let Some(key) = self.current_column() {
            self.store.set_sort_direction(key, direction);
            self.refresh();
        }
    }

    fn hide_current_column(&mut self) {
        let Some(key) = self.current_column() else {
            return;
        };
        if column(key).hideable {
            self.store.set_column_visibility(key, false);
            self.set_status_message(format!("Hid column {}", key.as_str()));
            self.refresh();
        } else {
            self.set_status_message(format!("Column {} can not be hidden", key.as_str()));
        }
    }

    fn clear_filters(&mut self) {
        self.store.clear_filters();
        self.set_status_message("Cleared search and filters");
        self.refresh();
    }

    fn toggle_row_selection(&mut self) {
        if let Some(id) = self.current_row_id() {
            self.store.toggle_row_selection(id);
            self.refresh();
        }
    }

    fn toggle_select_all(&mut self) {
        let select = self.rows.header.select_all != CheckState::Checked;
        self.store
            .toggle_all_visible_selected(select, &self.rows.visible_ids());
        self.refresh();
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn exit(&mut self) {
        if self.modus == Modus::POPUP {
            trace!("Close popup ...");
            self.modus = self.previous_modus;
            self.previous_modus = Modus::POPUP;
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        if mode == CMDMode::FilterByColumn {
            match self.current_column() {
                Some(key) if column(key).filterable => {}
                _ => {
                    self.set_status_message("Column can not be filtered");
                    return;
                }
            }
        }
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;

        self.input.clear();
        let current = match mode {
            CMDMode::SearchTable => self.store.get().global_filter.clone(),
            CMDMode::FilterByColumn => self
                .current_column()
                .and_then(|key| self.store.get().column_filters.get(&key).cloned())
                .unwrap_or_default(),
        };
        self.input.set(&current);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        // Search filters while typing.
        if self.cmd_mode == Some(CMDMode::SearchTable) {
            let text = self.last_input.input.clone();
            self.store.set_global_filter(&text);
            self.refresh();
        }
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode {
            Some(CMDMode::SearchTable) => {
                self.set_status_message(format!(
                    "Search \"{cmd_input}\" matched {} records",
                    self.rows.total_filtered_count
                ));
            }
            Some(CMDMode::FilterByColumn) if !self.last_input.canceled => {
                if let Some(key) = self.current_column() {
                    self.store.set_column_filter(key, &cmd_input);
                    self.refresh();
                    self.set_status_message(format!(
                        "Filter {} \"{cmd_input}\" matched {} records",
                        key.as_str(),
                        self.rows.total_filtered_count
                    ));
                }
            }
            Some(CMDMode::FilterByColumn) => debug!("Column filter canceled"),
            None => info!("Cmd mode is none!"),
        }

        self.cmd_mode = None;
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    /// CSV lines for the selected records, or for the cursor row if nothing is selected.
    fn rows_as_csv(&self) -> Option<String> {
        let view = self.store.get();
        let records: Vec<&Record> = if view.selection.is_empty() {
            let id = self.current_row_id()?;
            self.tracker.records().iter().filter(|r| r.id == id).collect()
        } else {
            self.tracker
                .records()
                .iter()
                .filter(|r| view.is_selected(r.id))
                .collect()
        };
        if records.is_empty() {
            return None;
        }
        let lines: Vec<String> = records
            .iter()
            .map(|r| {
                [r.id.to_string(), r.name.clone(), r.username.clone(), r.email.clone()]
                    .iter()
                    .map(|c| Model::wrap_cell_content(c))
                    .collect::<Vec<String>>()
                    .join(",")
            })
            .collect();
        Some(lines.join("\n"))
    }

    fn copy_rows(&mut self) {
        let Some(content) = self.rows_as_csv() else {
            self.set_status_message("Nothing to copy");
            return;
        };
        let lines = content.lines().count();

        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard unavailable: {e:?}");
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        let result = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(content),
            None => return,
        };
        match result {
            Ok(_) => {
                trace!("Copied {lines} rows to clipboard.");
                self.set_status_message(format!("Copied {lines} rows"));
            }
            Err(e) => {
                warn!("Error copying to clipboard: {e:?}");
                self.set_status_message("Copy failed");
            }
        }
    }
}

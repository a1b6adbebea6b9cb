use std::borrow::Cow;
use std::io::Error;
use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use serde::{Deserialize, Serialize};

use crate::fetch::Completion;

/// Records requested on top of the page size to detect whether another page exists.
pub const LOOKAHEAD_COUNT: usize = 1;

pub const DEFAULT_ENDPOINT: &str = "https://jsonplaceholder.typicode.com/users";
pub const DEFAULT_PAGE_SIZE: usize = 5;

pub const HELP_TEXT: &str = "\
Navigation
  j/k, Up/Down     move row cursor
  h/l              move column cursor
  Left/Right, p/n  previous / next remote page
  PgUp/PgDn        previous / next local page

Sorting & filtering
  s                cycle sort on column (asc, desc, none)
  a / d            sort column ascending / descending
  /                search all columns
  f                filter current column
  c                clear search and filters

Columns & selection
  v                hide current column
  V                show all columns
  Space            select row
  A                select all visible rows
  y                copy selected rows as CSV

  ?  help   Esc  close   q  quit";

#[derive(Debug, thiserror::Error)]
pub enum RVError {
    #[error("io error: {0}")]
    IoError(#[from] Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to set up logging: {0}")]
    Logging(String),
}

/// One record as delivered by the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Record {
    pub id: u64,
    pub name: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnKey {
    Select,
    Name,
    Username,
    Email,
}

impl ColumnKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKey::Select => "select",
            ColumnKey::Name => "name",
            ColumnKey::Username => "username",
            ColumnKey::Email => "email",
        }
    }

    /// Raw field value used for filtering and sorting. The selection column has none.
    pub fn value<'a>(&self, record: &'a Record) -> Option<&'a str> {
        match self {
            ColumnKey::Select => None,
            ColumnKey::Name => Some(&record.name),
            ColumnKey::Username => Some(&record.username),
            ColumnKey::Email => Some(&record.email),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Static description of a table column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDescriptor {
    pub key: ColumnKey,
    pub title: &'static str,
    pub sortable: bool,
    pub filterable: bool,
    pub hideable: bool,
    pub render: fn(&Record) -> Cow<'_, str>,
}

fn render_nothing(_: &Record) -> Cow<'_, str> {
    Cow::Borrowed("")
}

fn render_name(record: &Record) -> Cow<'_, str> {
    Cow::Borrowed(&record.name)
}

fn render_username(record: &Record) -> Cow<'_, str> {
    Cow::Borrowed(&record.username)
}

fn render_email(record: &Record) -> Cow<'_, str> {
    Cow::Owned(record.email.to_lowercase())
}

pub const COLUMNS: [ColumnDescriptor; 4] = [
    ColumnDescriptor {
        key: ColumnKey::Select,
        title: "",
        sortable: false,
        filterable: false,
        hideable: false,
        render: render_nothing,
    },
    ColumnDescriptor {
        key: ColumnKey::Name,
        title: "Name",
        sortable: true,
        filterable: true,
        hideable: true,
        render: render_name,
    },
    ColumnDescriptor {
        key: ColumnKey::Username,
        title: "Username",
        sortable: true,
        filterable: true,
        hideable: true,
        render: render_username,
    },
    ColumnDescriptor {
        key: ColumnKey::Email,
        title: "Email",
        sortable: true,
        filterable: true,
        hideable: true,
        render: render_email,
    },
];

pub fn column(key: ColumnKey) -> &'static ColumnDescriptor {
    // COLUMNS holds exactly one descriptor per key, in declaration order.
    &COLUMNS[key as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    SearchTable,
    FilterByColumn,
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    PrevPage,
    NextPage,
    PrevLocalPage,
    NextLocalPage,
    ToggleSort,
    SortAscending,
    SortDescending,
    Search,
    Filter,
    ClearFilters,
    HideColumn,
    ShowAllColumns,
    ToggleRowSelection,
    ToggleSelectAll,
    CopyRows,
    Help,
    Exit,
    RawKey(KeyEvent),
    Fetched(Completion),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct RVConfig {
    pub endpoint: String,
    pub page_size: usize,
    pub timeout: Option<Duration>,
    pub event_poll_time: u64,
}

impl Default for RVConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: None,
            event_poll_time: 100,
        }
    }
}

impl RVConfig {
    pub fn validate(&self) -> Result<(), RVError> {
        if self.page_size == 0 {
            return Err(RVError::InvalidConfig("page size must be positive".into()));
        }
        url::Url::parse(&self.endpoint)
            .map_err(|e| RVError::InvalidConfig(format!("endpoint {}: {e}", self.endpoint)))?;
        Ok(())
    }

    /// Number of records requested per remote page.
    pub fn request_size(&self) -> usize {
        self.page_size + LOOKAHEAD_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_indexed_by_key() {
        for key in [
            ColumnKey::Select,
            ColumnKey::Name,
            ColumnKey::Username,
            ColumnKey::Email,
        ] {
            assert_eq!(column(key).key, key);
        }
    }

    #[test]
    fn email_is_rendered_lowercase() {
        let record = Record {
            id: 1,
            name: "Leanne Graham".into(),
            username: "Bret".into(),
            email: "Sincere@April.biz".into(),
        };
        assert_eq!((column(ColumnKey::Email).render)(&record), "sincere@april.biz");
        assert_eq!((column(ColumnKey::Username).render)(&record), "Bret");
    }

    #[test]
    fn config_validation() {
        assert!(RVConfig::default().validate().is_ok());
        assert!(RVConfig::default().with_page_size(0).validate().is_err());
        assert!(
            RVConfig::default()
                .with_endpoint("not a url".to_string())
                .validate()
                .is_err()
        );
        assert_eq!(RVConfig::default().request_size(), 6);
    }
}

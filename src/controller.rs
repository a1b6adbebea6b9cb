use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, RVConfig, RVError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &RVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, RVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            if model.raw_keyevents() {
                return Ok(Some(Message::RawKey(key)));
            }
            return Ok(self.handle_key(key));
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::Left, _) | (KeyCode::Char('p'), _) => Some(Message::PrevPage),
            (KeyCode::Right, _) | (KeyCode::Char('n'), _) => Some(Message::NextPage),
            (KeyCode::PageUp, _) => Some(Message::PrevLocalPage),
            (KeyCode::PageDown, _) => Some(Message::NextLocalPage),
            (KeyCode::Char('s'), _) => Some(Message::ToggleSort),
            (KeyCode::Char('a'), _) => Some(Message::SortAscending),
            (KeyCode::Char('d'), _) => Some(Message::SortDescending),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('f'), _) => Some(Message::Filter),
            (KeyCode::Char('c'), _) => Some(Message::ClearFilters),
            (KeyCode::Char('v'), _) => Some(Message::HideColumn),
            (KeyCode::Char('V'), _) => Some(Message::ShowAllColumns),
            (KeyCode::Char(' '), _) => Some(Message::ToggleRowSelection),
            (KeyCode::Char('A'), _) => Some(Message::ToggleSelectAll),
            (KeyCode::Char('y'), _) => Some(Message::CopyRows),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

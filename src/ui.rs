use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::{CMDMode, ColumnKey, SortDirection};
use crate::fetch::LoadState;
use crate::model::{Model, UIData};
use crate::pipeline::{CheckState, Header, RowModel};

pub const CMDLINE_HEIGH: u16 = 1;
pub const SELECT_COLUMN_WIDTH: u16 = 3;
const SKELETON_CELL: &str = "░░░░░░░░░░";

#[derive(Debug, Default)]
pub struct TableUI {
    state: TableState,
}

fn checkbox(state: CheckState) -> &'static str {
    match state {
        CheckState::Unchecked => "[ ]",
        CheckState::Indeterminate => "[-]",
        CheckState::Checked => "[x]",
    }
}

/// Column of the prompt cursor, kept inside `area`.
fn cursor_column(area: Rect, offset: usize) -> u16 {
    area.x
        .saturating_add(u16::try_from(offset).unwrap_or(u16::MAX))
        .min(area.right().saturating_sub(1))
}

fn widths(header: &Header) -> Vec<Constraint> {
    header
        .columns
        .iter()
        .map(|c| match c.key {
            ColumnKey::Select => Constraint::Length(SELECT_COLUMN_WIDTH),
            _ => Constraint::Fill(1),
        })
        .collect()
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [title_area, body_area, footer_area, cmd_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(CMDLINE_HEIGH),
        ])
        .areas(frame.area());

        frame.render_widget(Self::title(&uidata), title_area);

        match uidata.load_state {
            LoadState::Idle | LoadState::Loading => {
                frame.render_widget(Self::skeleton(uidata.rows, uidata.page_size), body_area)
            }
            LoadState::Error(message) => {
                frame.render_widget(Self::error_panel(message), body_area)
            }
            LoadState::Success(_) => {
                let table = Self::table(&uidata);
                self.state = TableState::default()
                    .with_selected(Some(uidata.selected_row))
                    .with_selected_column(Some(uidata.selected_column));
                frame.render_stateful_widget(table, body_area, &mut self.state);
                frame.render_widget(Self::footer(&uidata), footer_area);
            }
        }

        Self::draw_cmdline(&uidata, frame, cmd_area);

        if uidata.show_popup {
            Self::draw_popup(uidata.popup_message, frame);
        }
    }

    fn title(uidata: &UIData) -> Line<'static> {
        let mut spans = vec![" Records ".bold(), uidata.location.clone().yellow()];
        let view = &uidata.view;
        if !view.global_filter.is_empty() {
            spans.push(format!("  search: \"{}\"", view.global_filter).into());
        }
        for (key, value) in view.column_filters.iter() {
            spans.push(format!("  {}: \"{value}\"", key.as_str()).into());
        }
        let hidden: Vec<&str> = view
            .visibility
            .iter()
            .filter(|(_, visible)| !**visible)
            .map(|(key, _)| key.as_str())
            .collect();
        if !hidden.is_empty() {
            spans.push(format!("  hidden: {}", hidden.join(", ")).dim());
        }
        Line::from(spans)
    }

    fn header_row(header: &Header) -> Row<'static> {
        let cells = header.columns.iter().map(|c| {
            if c.key == ColumnKey::Select {
                return Cell::from(checkbox(header.select_all));
            }
            let marker = match c.sort {
                Some(SortDirection::Ascending) => " ▲",
                Some(SortDirection::Descending) => " ▼",
                None if c.sortable => " ↕",
                None => "",
            };
            Cell::from(format!("{}{marker}", c.title))
        });
        Row::new(cells).bold().underlined()
    }

    fn skeleton(rows: &RowModel, page_size: usize) -> Table<'static> {
        let header = Row::new(rows.header.columns.iter().map(|_| Cell::from(SKELETON_CELL)));
        let body = (0..page_size)
            .map(|_| Row::new(rows.header.columns.iter().map(|_| Cell::from(SKELETON_CELL))));
        Table::new(body, widths(&rows.header))
            .header(header)
            .dim()
            .block(Block::bordered().border_set(border::PLAIN))
    }

    fn error_panel(message: &str) -> Paragraph<'_> {
        Paragraph::new(Text::from(vec![Line::from(""), Line::from(message)]))
            .red()
            .centered()
            .wrap(Wrap { trim: true })
            .block(Block::bordered().border_set(border::PLAIN))
    }

    fn table<'a>(uidata: &UIData<'a>) -> Table<'a> {
        let model = uidata.rows;
        let header = Self::header_row(&model.header);
        let rows: Vec<Row> = if model.rows.is_empty() {
            vec![Row::new(vec![Cell::from("No results.")])]
        } else {
            model
                .rows
                .iter()
                .map(|row| {
                    let cells = row.cells.iter().zip(model.header.columns.iter()).map(
                        |(value, col)| match col.key {
                            ColumnKey::Select => Cell::from(checkbox(if row.selected {
                                CheckState::Checked
                            } else {
                                CheckState::Unchecked
                            })),
                            _ => Cell::from(value.as_str()),
                        },
                    );
                    let style = if row.selected {
                        Style::default().add_modifier(Modifier::BOLD)
                    } else {
                        Style::default()
                    };
                    Row::new(cells).style(style)
                })
                .collect()
        };

        let widths = if model.rows.is_empty() {
            vec![Constraint::Fill(1)]
        } else {
            widths(&model.header)
        };

        Table::new(rows, widths)
            .header(header)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .cell_highlight_style(Style::default().add_modifier(Modifier::UNDERLINED))
            .block(Block::bordered().border_set(border::PLAIN))
    }

    fn footer(uidata: &UIData) -> Line<'static> {
        let model = uidata.rows;
        let button = |label: &'static str, enabled: bool| -> Span<'static> {
            if enabled { label.bold() } else { label.dim() }
        };
        let mut spans = vec![
            format!(
                "{} of {} rows · {} selected",
                model.rows.len(),
                model.total_filtered_count,
                uidata.view.selection.len()
            )
            .into(),
        ];
        if model.page_count > 1 {
            spans.push(format!(" · local page {}/{}", model.page_index + 1, model.page_count).into());
        }
        spans.push("   ".into());
        spans.push(button("[◀ Previous]", uidata.can_previous));
        spans.push(" ".into());
        spans.push(button("[Next ▶]", uidata.can_next));
        Line::from(spans).right_aligned()
    }

    fn draw_cmdline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = match uidata.cmd_mode {
                Some(CMDMode::FilterByColumn) => uidata
                    .rows
                    .header
                    .columns
                    .get(uidata.selected_column)
                    .map(|c| format!("filter {}: ", c.key.as_str()))
                    .unwrap_or_else(|| "filter: ".to_string()),
                _ => "search: ".to_string(),
            };
            let x = cursor_column(area, prompt.chars().count() + uidata.cmdinput.curser_pos);
            frame.render_widget(
                Line::from(vec![prompt.bold(), uidata.cmdinput.input.clone().into()]),
                area,
            );
            frame.set_cursor_position((x, area.y));
        } else {
            frame.render_widget(
                Line::from(vec![
                    uidata.status_message.to_string().into(),
                    "   ? help".dim(),
                ]),
                area,
            );
        }
    }

    fn draw_popup(message: &str, frame: &mut Frame) {
        let height = message.lines().count() as u16 + 2;
        let [area] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(frame.area());
        let [area] = Layout::horizontal([Constraint::Percentage(60)])
            .flex(Flex::Center)
            .areas(area);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(message).block(
                Block::bordered()
                    .title(Line::from(" Help ".bold()).centered())
                    .border_set(border::THICK),
            ),
            area,
        );
    }
}

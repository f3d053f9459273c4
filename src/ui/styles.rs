//! Color scheme and styling for the TUI dashboard.

use std::time::Duration;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders},
};

pub const HEADER_BG: Color = Color::Rgb(30, 30, 46);
pub const HEADER_FG: Color = Color::Rgb(180, 190, 254);

pub const TABLE_HEADER_FG: Color = Color::Rgb(137, 180, 250);

pub const SELECTED_BG: Color = Color::Rgb(137, 180, 250);
pub const SELECTED_FG: Color = Color::Black;

pub const SUCCESS_COLOR: Color = Color::Rgb(166, 227, 161);
pub const ERROR_COLOR: Color = Color::Rgb(243, 139, 168);
pub const WARNING_COLOR: Color = Color::Rgb(249, 226, 175);

pub const BORDER_COLOR: Color = Color::Rgb(69, 71, 90);
pub const TEXT_COLOR: Color = Color::Rgb(205, 214, 244);
pub const MUTED_COLOR: Color = Color::Rgb(127, 132, 156);

fn bold(fg: Color) -> Style {
    Style::default().fg(fg).add_modifier(Modifier::BOLD)
}

pub fn header_style() -> Style {
    bold(HEADER_FG).bg(HEADER_BG)
}

pub fn table_header_style() -> Style {
    bold(TABLE_HEADER_FG)
}

pub fn selected_row_style() -> Style {
    bold(SELECTED_FG).bg(SELECTED_BG)
}

pub fn border_style() -> Style {
    Style::default().fg(BORDER_COLOR)
}

pub fn success_style() -> Style {
    bold(SUCCESS_COLOR)
}

pub fn error_style() -> Style {
    bold(ERROR_COLOR)
}

pub fn highlight_style() -> Style {
    bold(WARNING_COLOR)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED_COLOR)
}

/// Colors a latency by how much of the race deadline it used: under a
/// quarter is good, under half is a warning.
pub fn latency_style(ms: f64, timeout: Duration) -> Style {
    let budget_ms = timeout.as_secs_f64() * 1000.0;
    if ms < budget_ms * 0.25 {
        success_style()
    } else if ms < budget_ms * 0.5 {
        highlight_style()
    } else {
        error_style()
    }
}

/// A bordered panel with a bold title.
pub fn panel<'a>(title: impl Into<Line<'a>>) -> Block<'a> {
    Block::default()
        .title(title)
        .title_style(bold(TEXT_COLOR))
        .borders(Borders::ALL)
        .border_style(border_style())
}

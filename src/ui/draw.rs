//! UI rendering functions for the TUI dashboard.

use ratatui::{
    prelude::*,
    widgets::{Cell, Gauge, Paragraph, Row, Table, Wrap},
};

use super::styles::*;
use crate::app::{App, Mode};

const KEYBINDS: [(&str, &str); 9] = [
    ("↑/↓", "select"),
    ("Space", "query selected"),
    ("Tab", "mode"),
    ("r", "race"),
    ("b", "batch"),
    ("+/-", "addresses"),
    (",/.", "batch size"),
    ("s", "reset"),
    ("q", "quit"),
];

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let [session, body, footer] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(frame.area());

    let [table, detail] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(body);

    draw_session(frame, session, app);
    draw_addresses_table(frame, table, app);
    draw_detail(frame, detail, app);
    draw_keybinds(frame, footer);
}

/// `label: value` with the label muted.
fn field<'a>(label: &'a str, value: impl Into<String>, style: Style) -> Vec<Span<'a>> {
    vec![
        Span::styled(format!("{label}: "), muted_style()),
        Span::styled(value.into(), style),
        Span::styled("  ", muted_style()),
    ]
}

fn text_style() -> Style {
    Style::default().fg(TEXT_COLOR)
}

fn draw_session(frame: &mut Frame, area: Rect, app: &App) {
    let success_rate = app.session.success_rate();
    let rate_style = match success_rate {
        r if r > 95.0 => success_style(),
        r if r > 80.0 => highlight_style(),
        _ => error_style(),
    };
    let failed_style = if app.session.failed > 0 {
        error_style()
    } else {
        text_style()
    };

    let counts = [
        field("Uptime", format_uptime(app.session.uptime()), text_style()),
        field("Races", app.session.races.to_string(), text_style()),
        field("Won", app.session.won.to_string(), success_style()),
        field("Failed", app.session.failed.to_string(), failed_style),
    ]
    .concat();
    let rates = [
        field("Rate", format!("{:.1} races/s", app.session.races_per_second()), highlight_style()),
        field("Avg", format!("{:.0}ms", app.session.average_latency()), text_style()),
        field(
            "Success",
            format!("{} {:.1}%", fill_bar(success_rate, 15), success_rate),
            rate_style,
        ),
    ]
    .concat();

    let paragraph = Paragraph::new(vec![Line::from(counts), Line::from(rates)])
        .block(panel(" Race Get :: Replica Race Dashboard ").title_style(header_style()));

    frame.render_widget(paragraph, area);
}

fn draw_addresses_table(frame: &mut Frame, area: Rect, app: &App) {
    let stats = &app.stats;
    let total_wins: u64 = stats.values().map(|s| s.wins).sum();

    let header = Row::new(
        ["Address", "Wins", "Avg ms", "Errors", "Latency Trend", "Win Rate"]
            .map(|h| Cell::from(h).style(table_header_style())),
    )
    .bottom_margin(1);

    let rows = app.addresses.iter().enumerate().map(|(idx, address)| {
        let snapshot = stats.get(address).cloned().unwrap_or_default();
        let win_rate = if total_wins > 0 {
            snapshot.wins as f64 / total_wins as f64 * 100.0
        } else {
            0.0
        };
        let history = app.session.history(address);

        let highlight_if = |cond: bool, style: Style| if cond { style } else { Style::default() };

        let row = Row::new([
            Cell::from(address.clone()),
            Cell::from(snapshot.wins.to_string())
                .style(highlight_if(snapshot.wins > 0, success_style())),
            Cell::from(format!("{:.1}", snapshot.avg_latency_ms)),
            Cell::from(snapshot.errors.to_string())
                .style(highlight_if(snapshot.errors > 0, error_style())),
            Cell::from(create_mini_sparkline(&history))
                .style(latency_style(snapshot.avg_latency_ms, app.timeout)),
            Cell::from(format!("{} {:.0}%", fill_bar(win_rate, 10), win_rate))
                .style(highlight_if(win_rate > 50.0, success_style())),
        ]);

        if idx == app.selected {
            row.style(selected_row_style())
        } else {
            row
        }
    });

    let title = match app.mode {
        Mode::Race => format!(" Addresses (racing {}) ", app.racing),
        Mode::SingleAddress => " Addresses ".to_string(),
    };

    let widths = [
        Constraint::Length(14),
        Constraint::Length(6),
        Constraint::Length(8),
        Constraint::Length(7),
        Constraint::Length(14),
        Constraint::Min(18),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(panel(title))
        .column_spacing(2);

    frame.render_widget(table, area);
}

fn draw_detail(frame: &mut Frame, area: Rect, app: &App) {
    let batch = app.batch;
    let gauge_height = if batch.running { 3 } else { 0 };
    let [race_area, batch_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(gauge_height)]).areas(area);

    let mode_style = match app.mode {
        Mode::Race => highlight_style(),
        Mode::SingleAddress => success_style(),
    };
    let batch_status = if batch.running {
        format!("running {}/{}", batch.done, batch.size)
    } else {
        format!("idle, size {}", batch.size)
    };

    let mut lines = vec![
        Line::from(field("Mode", app.mode_label(), mode_style)),
        Line::from(field("Key", app.key.as_str(), text_style())),
        Line::from(field("Selected", app.selected_address().unwrap_or("-"), text_style())),
        Line::from(field("Timeout", format!("{}ms", app.timeout.as_millis()), text_style())),
        Line::from(field("Batch", batch_status, muted_style())),
        Line::default(),
        Line::from(Span::styled(app.status.as_str(), text_style())),
    ];

    if let Some(last) = &app.last {
        let winner = last.winner.as_deref().unwrap_or("none");
        let winner_style = if last.ok { success_style() } else { error_style() };
        lines.push(Line::from(field("Winner", winner, winner_style)));
        lines.push(Line::from(field(
            "Latency",
            format!("{:.1} ms", last.latency_ms),
            latency_style(last.latency_ms, app.timeout),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(panel(" Race "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, race_area);

    if batch.running {
        let gauge = Gauge::default()
            .block(panel(" Batch "))
            .gauge_style(success_style())
            .percent(batch.percent())
            .label(format!("{}/{}", batch.done, batch.size));
        frame.render_widget(gauge, batch_area);
    }
}

fn draw_keybinds(frame: &mut Frame, area: Rect) {
    let spans: Vec<Span> = KEYBINDS
        .iter()
        .flat_map(|(key, action)| {
            [
                Span::styled(*key, highlight_style()),
                Span::styled(format!(" {action}  "), muted_style()),
            ]
        })
        .collect();

    frame.render_widget(Paragraph::new(Line::from(spans)).block(panel(" Keys ")), area);
}

const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Renders the last 11 latencies scaled between the history's min and max.
fn create_mini_sparkline(data: &[u64]) -> String {
    let (Some(&min), Some(&max)) = (data.iter().min(), data.iter().max()) else {
        return "───────────".to_string();
    };
    let range = (max - min).max(1) as f64;

    data.iter()
        .skip(data.len().saturating_sub(11))
        .map(|&val| {
            let level = ((val - min) as f64 / range * 7.0) as usize;
            SPARK_CHARS[level.min(7)]
        })
        .collect()
}

/// `[████░░░░]` filled to `pct` percent of `width` cells.
fn fill_bar(pct: f64, width: usize) -> String {
    let filled = ((pct / 100.0) * width as f64) as usize;
    format!(
        "[{}{}]",
        "█".repeat(filled.min(width)),
        "░".repeat(width.saturating_sub(filled))
    )
}

fn format_uptime(uptime: std::time::Duration) -> String {
    let secs = uptime.as_secs();
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m {}s", secs / 60, secs % 60),
        _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn sparkline_spans_min_to_max() {
        assert_eq!(create_mini_sparkline(&[]), "───────────");
        assert_eq!(create_mini_sparkline(&[10, 80]), "▁█");
        assert_eq!(create_mini_sparkline(&[5; 20]).chars().count(), 11);
    }

    #[test]
    fn fill_bar_clamps() {
        assert_eq!(fill_bar(50.0, 4), "[██░░]");
        assert_eq!(fill_bar(150.0, 2), "[██]");
    }

    #[test]
    fn uptime_units() {
        assert_eq!(format_uptime(Duration::from_secs(42)), "42s");
        assert_eq!(format_uptime(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_uptime(Duration::from_secs(7260)), "2h 1m");
    }
}

use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, BorderType, Borders, Cell, Row, Table},
    Frame,
};

use cctop_core::{SessionRow, SessionStatus};

/// Widget for displaying the session table
pub struct SessionTable;

impl SessionTable {
    /// Render the session table
    pub fn render(frame: &mut Frame, area: Rect, rows: &[SessionRow], now: DateTime<Utc>, color: bool) {
        let live = rows.iter().filter(|r| r.status.is_live()).count();
        let title = format!(" Sessions ({}/{} live) ", live, rows.len());

        let header = Row::new(["", "STATUS", "PROJECT", "BRANCH", "MSGS", "ACTIVE", "SESSION"])
            .style(Style::default().add_modifier(Modifier::BOLD));

        let body = rows.iter().map(|row| Self::create_row(row, now, color));

        let widths = [
            Constraint::Length(2),
            Constraint::Length(9),
            Constraint::Fill(2),
            Constraint::Fill(1),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(10),
        ];

        let table = Table::new(body, widths).header(header).block(
            Block::default()
                .title(title)
                .title_bottom(Line::from(" q quit ").right_aligned())
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Gray)),
        );

        frame.render_widget(table, area);
    }

    fn create_row(row: &SessionRow, now: DateTime<Utc>, color: bool) -> Row<'static> {
        let status_style = if color {
            Style::default().fg(Self::status_color(row.status))
        } else {
            Style::default()
        };

        Row::new(vec![
            Cell::from(row.status.indicator()).style(status_style),
            Cell::from(row.status.label()).style(status_style),
            Cell::from(truncate(&row.project_name, 40)),
            Cell::from(truncate(&row.branch, 30)),
            Cell::from(row.message_count.to_string()),
            Cell::from(relative_age(row.last_active, now)),
            Cell::from(truncate(&row.session_id, 8)),
        ])
    }

    fn status_color(status: SessionStatus) -> Color {
        match status {
            SessionStatus::Running => Color::Yellow,
            SessionStatus::Waiting => Color::Red,
            SessionStatus::Idle => Color::Green,
            SessionStatus::Inactive => Color::DarkGray,
        }
    }
}

/// Compact age like `12s`, `4m`, `3h`, `2d`
fn relative_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}

/// Truncate a string to a maximum length
fn truncate(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let truncated: String = chars[..max_len.saturating_sub(1)].iter().collect();
        format!("{}…", truncated)
    }
}

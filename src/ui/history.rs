//! History panel for lookup results

use crate::app::HistoryPanel;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

pub fn draw(frame: &mut Frame, area: Rect, panel: &HistoryPanel, is_active: bool) {
    let border_style = if is_active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .title(" History ")
        .borders(Borders::ALL)
        .border_style(border_style);

    let mut lines = vec![
        Line::from(Span::styled(
            panel.question_label.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("= {}", panel.value),
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
    ];

    if panel.entries.is_empty() {
        lines.push(Line::from(Span::styled(
            "No earlier responses",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for (i, entry) in panel.entries.iter().enumerate() {
        let selected = is_active && i == panel.selected;
        let prefix = if selected { "▸ " } else { "  " };
        let style = if selected {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(vec![
            Span::styled(prefix, style),
            Span::styled(entry.submitted_at.format("%Y-%m-%d %H:%M").to_string(), style),
            Span::styled(format!("  {}", entry.id), Style::default().fg(Color::DarkGray)),
        ]));
    }

    if is_active {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter:open  Esc:close",
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), area);
}

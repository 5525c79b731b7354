//! UI module for rendering the TUI

mod components;
mod forms;
mod history;
mod layout;
mod responses;

use crate::app::{App, View};
use components::{render_confirm_dialog, render_error_dialog};
use ratatui::{
    layout::Alignment,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
    let main_area = layout::create_layout(frame.area());

    match &app.view {
        View::Loading => {
            let loading = Paragraph::new("Loading form…")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(loading, main_area);
        }
        View::LoadFailed(reason) => {
            let lines = vec![
                Line::from(Span::styled(reason.as_str(), Style::default().fg(Color::Red))),
                Line::from(""),
                Line::from(Span::styled("Press r to retry or q to quit", Style::default().fg(Color::DarkGray))),
            ];
            let failed = Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(Block::default().title(" Form unavailable ").borders(Borders::ALL));
            frame.render_widget(failed, main_area);
        }
        View::Form => forms::draw_form(frame, main_area, app),
        View::Preview => forms::draw_preview(frame, main_area, app),
        View::Responses => {
            if let Some(listing) = &app.responses {
                responses::draw(frame, main_area, listing);
            }
        }
    }

    // Draw status bar
    layout::draw_status_bar(frame, app);

    // Modal overlays
    if let Some(session) = &app.session {
        if let Some((section_id, index)) = session.rows().pending_delete() {
            let title = session
                .version()
                .section(section_id)
                .map(|s| s.title.as_str())
                .unwrap_or(section_id);
            let summary = session
                .store()
                .rows(section_id)
                .get(index)
                .map(|row| {
                    row.values()
                        .filter_map(|v| v.display())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            render_confirm_dialog(frame, title, index, &summary, app.delete_selected);
        }
    }

    if let Some(error) = app.current_error() {
        render_error_dialog(frame, error);
    }
}

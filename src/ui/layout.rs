//! Layout components (content area, status bar)

use crate::app::{App, Target, View};
use crate::state::NoticeKind;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Content area above the status bar
pub fn create_layout(area: Rect) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    chunks[0]
}

/// Draw the status bar
pub fn draw_status_bar(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let status_area = Rect {
        x: 0,
        y: area.height.saturating_sub(1),
        width: area.width,
        height: 1,
    };

    let mut spans = vec![];

    // Lookup activity
    let in_flight = app.fetches_in_flight();
    if in_flight > 0 {
        spans.push(Span::styled(format!(" ⟳ {in_flight} "), Style::default().fg(Color::Yellow)));
    } else {
        spans.push(Span::raw(" "));
    }

    spans.push(Span::styled(get_view_hints(app), Style::default().fg(Color::Gray)));

    // Latest notice
    if let Some(notice) = app.session.as_ref().and_then(|s| s.latest_notice()) {
        let color = match notice.kind {
            NoticeKind::Success => Color::Green,
            NoticeKind::Failure => Color::Red,
        };
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(notice.message.clone(), Style::default().fg(color)));
    }

    // Copy message
    if let Some(msg) = &app.copy_message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(msg.clone(), Style::default().fg(Color::Green)));
    }

    let quit_hint = " ^C:quit ";

    let status = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status, status_area);

    // Render quit hint on the right
    let quit_area = Rect {
        x: area.width.saturating_sub(quit_hint.len() as u16),
        y: area.height.saturating_sub(1),
        width: (quit_hint.len() as u16).min(area.width),
        height: 1,
    };
    let quit_widget = Paragraph::new(quit_hint).style(Style::default().bg(Color::DarkGray).fg(Color::Gray));
    frame.render_widget(quit_widget, quit_area);
}

/// Get keyboard hints for the current view and focus
fn get_view_hints(app: &App) -> String {
    match &app.view {
        View::Loading => "Loading form…".to_string(),
        View::LoadFailed(_) => "r:retry  q:quit".to_string(),
        View::Preview => "j/k:scroll  y:copy payload  Esc:back".to_string(),
        View::Responses => "j/k:nav  Enter:view  r:refresh  Esc:back".to_string(),
        View::Form => {
            let global = "^S:submit  ^P:preview  ^L:responses";
            match app.focused() {
                Some(Target::Table { .. }) => format!("Tab:next  j/k:row  e:edit  d:delete  J/K:move  {global}"),
                Some(Target::History) => "j/k:nav  Enter:open  Esc:close  Tab:next".to_string(),
                Some(Target::Field { section_id, .. }) => {
                    let row_hint = app.session.as_ref().and_then(|s| {
                        let repeatable = s.version().section(&section_id)?.is_repeatable;
                        repeatable.then(|| match s.rows().editing_index(&section_id) {
                            Some(_) => "^A:save row  Esc:cancel  ",
                            None => "^A:add row  ",
                        })
                    });
                    format!("Tab:next  ^F:lookup  {}{global}", row_hint.unwrap_or(""))
                }
                None => global.to_string(),
            }
        }
    }
}

//! Form and preview screens

mod field_renderer;
mod sections;

use super::history;
use crate::app::{App, Target};
use crate::render::RenderMode;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders},
    Frame,
};
use sections::{draw_sections, DrawContext};

/// Draw the editable form, with the history panel on the right when present
pub fn draw_form(frame: &mut Frame, area: Rect, app: &App) {
    let Some(session) = &app.session else {
        return;
    };

    let (form_area, history_area) = if app.history.is_some() {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(42)])
            .split(area);
        (chunks[0], Some(chunks[1]))
    } else {
        (area, None)
    };

    let block = Block::default()
        .title(format!(" {} ", session.form().title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(form_area);
    frame.render_widget(block, form_area);

    let focus = app.focused();
    let busy = |key: &str| app.is_fetching(key);
    let ctx = DrawContext {
        mode: RenderMode::Edit,
        focus: focus.as_ref(),
        option_cursor: app.option_cursor,
        table_row: app.table_row,
        busy: &busy,
    };
    draw_sections(frame, inner, &app.form_sections(), &ctx, 0);

    if let (Some(panel), Some(history_area)) = (&app.history, history_area) {
        history::draw(frame, history_area, panel, focus == Some(Target::History));
    }
}

/// Draw a read-only preview of the form or a stored response
pub fn draw_preview(frame: &mut Frame, area: Rect, app: &App) {
    let Some(preview) = &app.preview else {
        return;
    };

    let block = Block::default()
        .title(format!(" {} ", preview.title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let not_busy = |_: &str| false;
    let ctx = DrawContext {
        mode: RenderMode::Preview,
        focus: None,
        option_cursor: 0,
        table_row: 0,
        busy: &not_busy,
    };
    draw_sections(frame, inner, &preview.sections, &ctx, preview.scroll);
}

//! Field rendering for form questions

use crate::render::{FieldView, RenderMode, WidgetSpec};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// How a field is drawn this frame
#[derive(Debug, Clone, Copy)]
pub struct FieldState {
    pub is_active: bool,
    /// Highlighted option of an active choice field
    pub option_cursor: usize,
    /// A lookup for this field is running
    pub busy: bool,
}

/// Rows a field needs, borders included
pub fn field_height(field: &FieldView, mode: RenderMode) -> u16 {
    let content = match (mode, &field.widget) {
        (RenderMode::Preview, WidgetSpec::TextArea) => field.display(mode).lines().count().max(1),
        (RenderMode::Preview, _) | (RenderMode::Edit, WidgetSpec::TextInput) => 1,
        (RenderMode::Edit, WidgetSpec::TextArea) => field.value.as_text().lines().count().max(3),
        (RenderMode::Edit, widget) => widget.options().len().max(1),
    };
    content as u16 + 2
}

/// Draw one question with its current value
pub fn draw_field(frame: &mut Frame, area: Rect, field: &FieldView, mode: RenderMode, state: FieldState) {
    let border_style = if state.is_active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let mut title = format!(" {}", field.label);
    if field.required {
        title.push_str(" *");
    }
    if state.busy {
        title.push_str(" (fetching…)");
    } else if field.fetchable && state.is_active && mode == RenderMode::Edit {
        title.push_str(" (^F lookup)");
    }
    title.push(' ');

    let mut block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);
    if let Some(help) = field.help_text.as_deref().filter(|_| mode == RenderMode::Edit) {
        block = block.title_bottom(Line::from(Span::styled(
            format!(" {help} "),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let content = match mode {
        RenderMode::Preview => preview_lines(field),
        RenderMode::Edit => match &field.widget {
            WidgetSpec::TextInput | WidgetSpec::TextArea => text_lines(field, state.is_active),
            widget => option_lines(widget, state),
        },
    };

    frame.render_widget(Paragraph::new(content).wrap(Wrap { trim: false }).block(block), area);
}

fn preview_lines(field: &FieldView) -> Vec<Line<'static>> {
    field
        .display(RenderMode::Preview)
        .lines()
        .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::White))))
        .collect()
}

fn text_lines(field: &FieldView, is_active: bool) -> Vec<Line<'static>> {
    let style = if is_active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let value = field.value.as_text();
    let display_value = if value.is_empty() && !is_active {
        "(empty)".to_string()
    } else {
        value
    };

    let mut lines: Vec<Line> = display_value
        .split('\n')
        .map(|l| Line::from(Span::styled(l.to_string(), style)))
        .collect();
    if is_active {
        let cursor = Span::styled("▌", Style::default().fg(Color::Cyan));
        match lines.last_mut() {
            Some(last) => last.spans.push(cursor),
            None => lines.push(Line::from(cursor)),
        }
    }
    lines
}

fn option_lines(widget: &WidgetSpec, state: FieldState) -> Vec<Line<'static>> {
    let (on, off) = match widget {
        WidgetSpec::CheckboxGroup(_) => ("[x] ", "[ ] "),
        _ => ("(•) ", "( ) "),
    };
    widget
        .options()
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let highlighted = state.is_active && i == state.option_cursor;
            let prefix = if highlighted { "▸ " } else { "  " };
            let mark = if option.selected { on } else { off };
            let style = match (highlighted, option.selected) {
                (true, _) => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                (false, true) => Style::default().fg(Color::White),
                (false, false) => Style::default().fg(Color::DarkGray),
            };
            Line::from(Span::styled(format!("{prefix}{mark}{}", option.label), style))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::field_view;
    use crate::schema::fixtures::*;
    use crate::schema::FieldKind;
    use crate::state::AnswerValue;

    #[test]
    fn test_field_heights() {
        let sec = section("s", vec![]);
        let name = field_view(&sec, &text("name"), AnswerValue::text("Ada"));
        assert_eq!(field_height(&name, RenderMode::Edit), 3);

        let notes_q = question("notes", FieldKind::MultilineText);
        let notes = field_view(&sec, &notes_q, AnswerValue::text("a\nb\nc\nd"));
        assert_eq!(field_height(&notes, RenderMode::Edit), 6);
        assert_eq!(field_height(&notes, RenderMode::Preview), 6);

        let symptoms = field_view(&sec, &multi("sym", &["a", "b"]), AnswerValue::Empty);
        assert_eq!(field_height(&symptoms, RenderMode::Edit), 4);
        assert_eq!(field_height(&symptoms, RenderMode::Preview), 3);
    }
}

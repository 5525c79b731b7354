//! Error dialog component

use super::base::{key_hint, render_dialog, DialogConfig};
use ratatui::{style::Color, text::Span, Frame};

/// Render an error dialog overlay centered on the screen
pub fn render_error_dialog(frame: &mut Frame, error_message: &str) {
    let mut hint = vec![Span::raw("Press ")];
    key_hint(&mut hint, "Enter", "");
    hint.push(Span::raw(" or "));
    key_hint(&mut hint, "Esc", " to dismiss");

    render_dialog(
        frame,
        DialogConfig {
            title: "Error",
            title_color: Color::Red,
            border_color: Color::Red,
            message: error_message,
            hint: Some(hint),
            ..Default::default()
        },
    );
}

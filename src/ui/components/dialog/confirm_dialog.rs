//! Confirmation dialog for deleting a repeatable-section row

use super::base::{key_hint, render_dialog, DialogConfig};
use ratatui::{style::Color, Frame};

const CHOICES: &[(&str, Color)] = &[("Cancel", Color::White), ("Delete", Color::Red)];

/// Render the row delete confirmation; `delete_selected` highlights Delete
pub fn render_confirm_dialog(frame: &mut Frame, section_title: &str, index: usize, summary: &str, delete_selected: bool) {
    let summary = truncate_string(summary, 40);
    let message = if summary.is_empty() {
        format!("Delete row {} of {section_title}?", index + 1)
    } else {
        format!("Delete row {} of {section_title}?\n{summary}", index + 1)
    };

    let mut hint = Vec::new();
    key_hint(&mut hint, "↑↓", " select  ");
    key_hint(&mut hint, "Enter", " confirm  ");
    key_hint(&mut hint, "Esc", " cancel");

    render_dialog(
        frame,
        DialogConfig {
            title: "Confirm Delete",
            title_color: Color::Red,
            border_color: Color::Red,
            message: &message,
            choices: Some((CHOICES, usize::from(delete_selected))),
            hint: Some(hint),
            max_width: 50,
        },
    );
}

/// Truncate a string to a maximum number of characters with ellipsis
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Aspirin", 10), "Aspirin");
        assert_eq!(truncate_string("Paracetamol 500mg", 10), "Paracet...");
        assert_eq!(truncate_string("ééééé", 4), "é...");
    }
}

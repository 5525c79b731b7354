//! Listing of every stored response

use crate::app::ResponsesListing;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

pub fn draw(frame: &mut Frame, area: Rect, listing: &ResponsesListing) {
    let block = Block::default()
        .title(format!(" Responses ({}) ", listing.rows.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    if listing.rows.is_empty() {
        let empty = Paragraph::new(Span::styled("No responses yet", Style::default().fg(Color::DarkGray))).block(block);
        frame.render_widget(empty, area);
        return;
    }

    let header = Row::new(
        std::iter::once("Submitted".to_string())
            .chain(listing.columns.iter().cloned())
            .map(Cell::from)
            .collect::<Vec<_>>(),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = listing.rows.iter().map(|row| {
        let cells = std::iter::once(row.submitted_at.format("%Y-%m-%d %H:%M").to_string())
            .chain(row.cells.iter().cloned())
            .map(Cell::from)
            .collect::<Vec<_>>();
        Row::new(cells)
    });

    let widths = std::iter::once(Constraint::Length(17))
        .chain(listing.columns.iter().map(|_| Constraint::Fill(1)))
        .collect::<Vec<_>>();

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    let mut state = TableState::default().with_selected(Some(listing.selected));
    frame.render_stateful_widget(table, area, &mut state);
}

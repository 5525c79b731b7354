//! Section layout shared by the editable form and previews

use super::field_renderer::{draw_field, field_height, FieldState};
use crate::app::Target;
use crate::render::{Arrangement, FieldView, RenderMode, SectionView, TableView};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

/// Focus and lookup state passed down while drawing
pub struct DrawContext<'a> {
    pub mode: RenderMode,
    pub focus: Option<&'a Target>,
    pub option_cursor: usize,
    pub table_row: usize,
    pub busy: &'a dyn Fn(&str) -> bool,
}

/// One vertical slot of the form
enum Item<'a> {
    Heading(&'a SectionView),
    Fields(Vec<&'a FieldView>),
    Table(&'a SectionView, &'a TableView),
}

impl Item<'_> {
    fn height(&self, mode: RenderMode) -> u16 {
        match self {
            Item::Heading(section) => 1 + u16::from(section.description.is_some()),
            Item::Fields(fields) => fields.iter().map(|f| field_height(f, mode)).max().unwrap_or(0),
            Item::Table(_, table) => table.rows.len().max(1) as u16 + 3,
        }
    }

    fn contains(&self, target: &Target) -> bool {
        match (self, target) {
            (
                Item::Fields(fields),
                Target::Field {
                    section_id,
                    question_id,
                },
            ) => fields
                .iter()
                .any(|f| &f.section_id == section_id && &f.question_id == question_id),
            (Item::Table(section, _), Target::Table { section_id }) => &section.id == section_id,
            _ => false,
        }
    }
}

fn items(sections: &[SectionView]) -> Vec<Item<'_>> {
    let mut items = Vec::new();
    for section in sections {
        items.push(Item::Heading(section));
        match &section.fields {
            Arrangement::Linear(fields) => items.extend(fields.iter().map(|f| Item::Fields(vec![f]))),
            Arrangement::TwoColumn { left, right } => {
                for i in 0..left.len().max(right.len()) {
                    items.push(Item::Fields(left.get(i).into_iter().chain(right.get(i)).collect()));
                }
            }
        }
        if let Some(table) = &section.table {
            items.push(Item::Table(section, table));
        }
    }
    items
}

/// First item to draw so that item `focus` fits in `height` rows
pub fn first_visible(heights: &[u16], focus: usize, height: u16) -> usize {
    let Some(last) = heights.len().checked_sub(1) else {
        return 0;
    };
    let focus = focus.min(last);
    let mut start = focus;
    let mut used = heights[focus];
    while start > 0 && used + heights[start - 1] <= height {
        start -= 1;
        used += heights[start];
    }
    // Prefer showing from the top when the focused item fits there
    if heights[..=focus].iter().map(|&h| u32::from(h)).sum::<u32>() <= u32::from(height) {
        0
    } else {
        start
    }
}

/// Draw sections top to bottom; in edit mode the focused item is kept in view,
/// in preview mode `scroll` skips whole items
pub fn draw_sections(frame: &mut Frame, area: Rect, sections: &[SectionView], ctx: &DrawContext, scroll: u16) {
    let items = items(sections);
    if items.is_empty() {
        let empty = Paragraph::new("This form has no questions.").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let heights: Vec<u16> = items.iter().map(|i| i.height(ctx.mode)).collect();
    let start = match (ctx.mode, ctx.focus) {
        (RenderMode::Edit, Some(target)) => {
            let focus = items.iter().position(|i| i.contains(target)).unwrap_or(0);
            first_visible(&heights, focus, area.height)
        }
        _ => usize::from(scroll).min(items.len() - 1),
    };

    let mut y = area.y;
    for (item, &height) in items.iter().zip(&heights).skip(start) {
        let bottom = area.y + area.height;
        if y >= bottom {
            break;
        }
        let slot = Rect {
            x: area.x,
            y,
            width: area.width,
            height: height.min(bottom - y),
        };
        match item {
            Item::Heading(section) => draw_heading(frame, slot, section),
            Item::Fields(fields) => draw_field_row(frame, slot, fields, ctx),
            Item::Table(section, table) => draw_table(frame, slot, section, table, ctx),
        }
        y += height;
    }
}

fn draw_heading(frame: &mut Frame, area: Rect, section: &SectionView) {
    let mut title = vec![Span::styled(
        section.title.clone(),
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )];
    if section.repeatable {
        title.push(Span::styled("  (repeatable)", Style::default().fg(Color::DarkGray)));
    }
    let mut lines = vec![Line::from(title)];
    if let Some(description) = &section.description {
        lines.push(Line::from(Span::styled(
            description.clone(),
            Style::default().fg(Color::Gray),
        )));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_field_row(frame: &mut Frame, area: Rect, fields: &[&FieldView], ctx: &DrawContext) {
    let areas = if fields.len() > 1 {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area)
            .to_vec()
    } else {
        vec![area]
    };

    for (field, slot) in fields.iter().zip(areas) {
        let is_active = ctx.focus.is_some_and(|t| {
            matches!(t, Target::Field { section_id, question_id }
                if section_id == &field.section_id && question_id == &field.question_id)
        });
        let state = FieldState {
            is_active,
            option_cursor: ctx.option_cursor,
            busy: (ctx.busy)(field.key.as_str()),
        };
        let height = field_height(field, ctx.mode).min(slot.height);
        draw_field(frame, Rect { height, ..slot }, field, ctx.mode, state);
    }
}

fn draw_table(frame: &mut Frame, area: Rect, section: &SectionView, table: &TableView, ctx: &DrawContext) {
    let is_active = matches!(ctx.focus, Some(Target::Table { section_id }) if section_id == &section.id);
    let border_style = if is_active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let title = match (ctx.mode, is_active) {
        (RenderMode::Edit, true) => format!(" {} rows (e:edit d:delete J/K:move) ", table.rows.len()),
        _ => format!(" {} rows ", table.rows.len()),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);

    if table.rows.is_empty() {
        let empty = Paragraph::new(Span::styled("No rows yet", Style::default().fg(Color::DarkGray))).block(block);
        frame.render_widget(empty, area);
        return;
    }

    let header = Row::new(
        table
            .columns
            .iter()
            .map(|c| Cell::from(c.label.clone()))
            .collect::<Vec<_>>(),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let selected = ctx.table_row.min(table.rows.len() - 1);
    let rows = table.rows.iter().enumerate().map(|(i, cells)| {
        let style = if table.editing == Some(i) {
            Style::default().fg(Color::Yellow)
        } else if is_active && i == selected {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default()
        };
        Row::new(cells.iter().map(|c| Cell::from(c.clone())).collect::<Vec<_>>()).style(style)
    });

    let widths = vec![Constraint::Fill(1); table.columns.len().max(1)];
    frame.render_widget(Table::new(rows, widths).header(header).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_visible_starts_at_top_when_it_fits() {
        assert_eq!(first_visible(&[2, 3, 3], 2, 10), 0);
    }

    #[test]
    fn test_first_visible_scrolls_to_focus() {
        // Focus on the last of five 3-row items in a 7-row viewport
        assert_eq!(first_visible(&[3, 3, 3, 3, 3], 4, 7), 3);
        // Focused item taller than the viewport is drawn from its top
        assert_eq!(first_visible(&[3, 12], 1, 7), 1);
    }

    #[test]
    fn test_first_visible_empty() {
        assert_eq!(first_visible(&[], 3, 10), 0);
    }
}

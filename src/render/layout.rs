//! Question visibility and section layout

use crate::expr::{evaluate_visibility, Scope};
use crate::schema::{Layout, Question, Section};

/// Questions of a section placed for display
#[derive(Debug, Clone, PartialEq)]
pub enum Arrangement<T> {
    Linear(Vec<T>),
    TwoColumn { left: Vec<T>, right: Vec<T> },
}

impl<T> Arrangement<T> {
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Arrangement<U> {
        match self {
            Arrangement::Linear(items) => Arrangement::Linear(items.into_iter().map(f).collect()),
            Arrangement::TwoColumn { left, right } => Arrangement::TwoColumn {
                left: left.into_iter().map(&mut f).collect(),
                right: right.into_iter().map(f).collect(),
            },
        }
    }

    /// Total number of items across all columns
    #[cfg(test)]
    pub fn len(&self) -> usize {
        match self {
            Arrangement::Linear(items) => items.len(),
            Arrangement::TwoColumn { left, right } => left.len() + right.len(),
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat display order: left column first, then right
    pub fn into_display_order(self) -> Vec<T> {
        match self {
            Arrangement::Linear(items) => items,
            Arrangement::TwoColumn { left, mut right } => {
                let mut items = left;
                items.append(&mut right);
                items
            }
        }
    }
}

/// Split items by index parity: odd indices go left, even indices go right
pub fn zigzag<T: Clone>(items: &[T]) -> (Vec<T>, Vec<T>) {
    let mut left = Vec::with_capacity(items.len() / 2);
    let mut right = Vec::with_capacity(items.len().div_ceil(2));
    for (index, item) in items.iter().enumerate() {
        if index % 2 == 0 {
            right.push(item.clone());
        } else {
            left.push(item.clone());
        }
    }
    (left, right)
}

/// Zig-zag order as one sequence, left group first
pub fn interleave<T: Clone>(items: &[T]) -> Vec<T> {
    let (mut left, mut right) = zigzag(items);
    left.append(&mut right);
    left
}

/// Questions whose visibility condition holds, in schema order
pub fn visible_questions<'a>(section: &'a Section, scope: &dyn Scope) -> Vec<&'a Question> {
    section
        .questions
        .iter()
        .filter(|q| evaluate_visibility(q.visibility.as_ref(), scope))
        .collect()
}

/// Visible questions arranged by the section's layout
pub fn plan_section<'a>(section: &'a Section, scope: &dyn Scope) -> Arrangement<&'a Question> {
    let visible = visible_questions(section, scope);
    match section.layout {
        Layout::Linear => Arrangement::Linear(visible),
        Layout::TwoColumn => {
            let (left, right) = zigzag(&visible);
            Arrangement::TwoColumn { left, right }
        }
    }
}

/// Column order of a repeatable section's row table
pub fn table_columns(section: &Section) -> Vec<&Question> {
    let questions: Vec<&Question> = section.questions.iter().collect();
    interleave(&questions)
}

//! Answer state module

mod binding;
pub mod codec;
mod rows;
mod session;
mod store;
mod value;

pub use binding::FieldKey;
pub use session::{FormSession, NoticeKind};
pub use store::{AnswerState, MergeReport, Row};
pub use value::{format_number, AnswerValue};

//! History lookups and dependent-field data

mod coordinator;

pub use coordinator::{apply_completion, Coordinator, EnrichError};

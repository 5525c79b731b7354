//! Form service client module

mod client;
mod traits;
mod types;

pub use client::HttpFormApi;
pub use traits::FormApi;
pub use types::{AuthContext, HistoryEntry, StoredResponse};

#[cfg(test)]
pub use types::DependentData;
#[cfg(test)]
pub use traits::MockFormApi;

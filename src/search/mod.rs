//! Search orchestration module
//!
//! Runs every selected source concurrently over one set of search keys and
//! delivers their records through a single bounded channel.

mod executor;
mod models;

pub use executor::Search;
pub use models::*;

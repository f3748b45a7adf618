//! Asset records, aggregation and report export

mod container;
pub mod report;
mod types;

pub use container::ResultContainer;
pub use types::*;

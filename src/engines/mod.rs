//! Provider engine module
//!
//! Defines the Engine trait, the shared pagination driver and a registry for
//! the built-in asset search providers.

mod loader;
mod registry;
mod source;
mod traits;

// Engine implementations
pub mod fofa;
pub mod hunter;
pub mod quake;
pub mod shodan;

pub use loader::EngineLoader;
pub use registry::EngineRegistry;
pub use source::{RecordStream, Source};
pub use traits::*;

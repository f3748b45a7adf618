//! Engine registry for managing available providers

use super::traits::Engine;
use super::{fofa, hunter, quake, shodan};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of configured provider engines
pub struct EngineRegistry {
    /// Engines by name
    engines: HashMap<String, Arc<dyn Engine>>,
}

impl EngineRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// Registry holding every built-in provider with default endpoints
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for name in Self::available_engines() {
            if let Some(engine) = Self::create_engine(name) {
                registry.register(Arc::from(engine));
            }
        }
        registry
    }

    /// Fresh, unconfigured instance of a built-in provider
    pub fn create_engine(name: &str) -> Option<Box<dyn Engine>> {
        let engine: Box<dyn Engine> = match name {
            "fofa" => Box::new(fofa::Fofa::new()),
            "hunter" => Box::new(hunter::Hunter::new()),
            "quake" => Box::new(quake::Quake::new()),
            "shodan" => Box::new(shodan::Shodan::new()),
            _ => return None,
        };
        Some(engine)
    }

    /// Names of the built-in providers
    pub fn available_engines() -> [&'static str; 4] {
        ["fofa", "hunter", "quake", "shodan"]
    }

    /// Register an engine, replacing any engine with the same name
    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        self.engines.insert(engine.name().to_string(), engine);
    }

    /// Get an engine by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Engine>> {
        self.engines.get(name)
    }

    /// Engines for the requested names, in request order.
    ///
    /// Names are matched case-insensitively after trimming; unknown names
    /// and repeats are ignored.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Vec<Arc<dyn Engine>> {
        let mut seen: Vec<String> = Vec::new();
        let mut selected = Vec::new();
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if seen.contains(&name) {
                continue;
            }
            if let Some(engine) = self.engines.get(&name) {
                selected.push(engine.clone());
            }
            seen.push(name);
        }
        selected
    }

    /// Get all engine names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.engines.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if an engine exists
    pub fn contains(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    /// Get number of registered engines
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

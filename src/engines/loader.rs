//! Engine loader for initializing providers from configuration

use super::registry::EngineRegistry;
use super::source::Source;
use super::traits::Engine;
use crate::config::Settings;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Loader for initializing engines from configuration
pub struct EngineLoader;

impl EngineLoader {
    /// Build the registry of enabled providers, applying their overrides
    pub fn load(settings: &Settings) -> EngineRegistry {
        let mut registry = EngineRegistry::new();

        for name in EngineRegistry::available_engines() {
            let config = settings.provider(name);
            if config.disabled {
                info!("Skipping disabled provider: {}", name);
                continue;
            }

            let Some(mut engine) = EngineRegistry::create_engine(name) else {
                continue;
            };
            engine.init(&config);
            debug!(
                "Loaded provider: {} (page size {})",
                name,
                engine.page_size()
            );
            registry.register(Arc::from(engine));
        }

        info!("Loaded {} providers", registry.len());
        registry
    }

    /// Bind the requested providers to the configured credentials.
    ///
    /// Unknown or disabled names are skipped with a warning.
    pub fn sources<S: AsRef<str>>(
        settings: &Settings,
        registry: &EngineRegistry,
        names: &[S],
    ) -> Vec<Source> {
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if !name.is_empty() && !registry.contains(&name) {
                warn!("Ignoring unknown or disabled provider: {}", name);
            }
        }

        let credentials = Arc::new(settings.credentials());
        let deadline = Duration::from_secs(settings.search.query_deadline);

        registry
            .select(names)
            .into_iter()
            .map(|engine| Source::new(engine, credentials.clone()).with_deadline(deadline))
            .collect()
    }
}

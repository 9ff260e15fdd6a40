//! Process-wide stage registry.
//!
//! Maps `(library, stage_name)` to a factory. Registration is one
//! explicit call per stage during process initialization; the registry
//! is read-only once pipelines start and is shared between runners.

use std::collections::HashMap;

use crate::stage::StageInstance;

/// Zero-argument stage factory.
pub type StageFactory = Box<dyn Fn() -> StageInstance + Send + Sync>;

/// Registration table resolving configured stages into instances.
#[derive(Default)]
pub struct StageRegistry {
    factories: HashMap<(String, String), StageFactory>,
}

impl StageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `(library, stage_name)`, replacing any
    /// previous registration for the same key.
    pub fn register<F>(&mut self, library: &str, stage_name: &str, factory: F)
    where
        F: Fn() -> StageInstance + Send + Sync + 'static,
    {
        self.factories
            .insert((library.to_string(), stage_name.to_string()), Box::new(factory));
    }

    /// Instantiate the stage registered under `(library, stage_name)`.
    ///
    /// Returns `None` for unregistered stages; the engine reports that as
    /// an unknown-stage configuration error during pipeline validation.
    #[must_use]
    pub fn create(&self, library: &str, stage_name: &str) -> Option<StageInstance> {
        self.factories
            .get(&(library.to_string(), stage_name.to_string()))
            .map(|factory| factory())
    }

    #[must_use]
    pub fn contains(&self, library: &str, stage_name: &str) -> bool {
        self.factories
            .contains_key(&(library.to_string(), stage_name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.factories.len())
            .finish()
    }
}

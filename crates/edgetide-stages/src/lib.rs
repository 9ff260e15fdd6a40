//! Built-in stage library.
//!
//! Registration is one explicit call during process initialization; the
//! registry is read-only once pipelines start.

pub mod destinations;
pub mod origins;
pub mod processors;

use edgetide_sdk::{StageInstance, StageRegistry};

/// Library name the built-in stages register under.
pub const LIBRARY: &str = "edgetide-basic-lib";

/// Register every built-in stage into `registry`.
pub fn register_builtins(registry: &mut StageRegistry) {
    registry.register(LIBRARY, origins::raw_data::STAGE_NAME, || {
        StageInstance::Origin(Box::new(origins::raw_data::RawDataOrigin::default()))
    });
    registry.register(LIBRARY, processors::selector::STAGE_NAME, || {
        StageInstance::Processor(Box::new(processors::selector::SelectorProcessor::default()))
    });
    registry.register(LIBRARY, destinations::trash::STAGE_NAME, || {
        StageInstance::Destination(Box::new(destinations::trash::TrashDestination))
    });
}

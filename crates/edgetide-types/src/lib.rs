//! Shared data model for the Edgetide pipeline engine.
//!
//! Pure data types used across the engine, SDK, and state crates:
//! the [`Field`]/[`Record`] model, configuration values, and pipeline
//! state. Kept free of I/O so every other crate can depend on it
//! without circular dependencies.

pub mod config;
pub mod error;
pub mod field;
pub mod path;
pub mod record;
pub mod state;

pub use config::{Config, ConfigValue};
pub use error::FieldError;
pub use field::Field;
pub use record::{Header, Record};
pub use state::{PipelineId, PipelineState, PipelineStatus, SourceOffset, WorkerInfo};

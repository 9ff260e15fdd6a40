//! Pipeline configuration: document types, JSON parsing, and bean binding.

pub mod bean;
pub mod parser;
pub mod types;

pub use bean::PipelineConfigBean;
pub use types::{PipelineConfiguration, StageConfiguration};

//! Stage contract and authoring SDK.
//!
//! Everything a stage implementation sees: the role traits
//! ([`Origin`], [`Processor`], [`Destination`]), the batch primitives
//! ([`Batch`], [`BatchMaker`]), the per-stage [`StageContext`], and the
//! process-wide [`StageRegistry`].

pub mod batch;
pub mod context;
pub mod error;
pub mod registry;
pub mod stage;

pub use batch::{Batch, BatchMaker};
pub use context::{ErrorSink, StageContext, StageContextBuilder};
pub use error::StageError;
pub use registry::StageRegistry;
pub use stage::{Destination, Origin, Processor, Stage, StageInstance, StageRole};

//! State backend trait definition.
//!
//! [`StateBackend`] defines the storage contract for pipeline lifecycle
//! state and source offsets. Model types live in `edgetide_types::state`.

use edgetide_types::{PipelineId, PipelineState, SourceOffset};

use crate::error;

/// Storage contract for pipeline state.
///
/// Implementations must be `Send + Sync` for use behind
/// `Arc<dyn StateBackend>` shared between runners.
pub trait StateBackend: Send + Sync {
    /// Read the persisted lifecycle state for a pipeline.
    ///
    /// Returns `Ok(None)` when the pipeline has never been saved.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::StateError) on storage failure.
    fn load_pipeline_state(
        &self,
        pipeline: &PipelineId,
    ) -> error::Result<Option<PipelineState>>;

    /// Upsert the lifecycle state for a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::StateError) on storage failure.
    fn save_pipeline_state(&self, state: &PipelineState) -> error::Result<()>;

    /// Read the committed source offset for a pipeline.
    ///
    /// Returns `Ok(None)` when no offset has been committed yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::StateError) on storage failure.
    fn get_offset(&self, pipeline: &PipelineId) -> error::Result<Option<SourceOffset>>;

    /// Commit the source offset for a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::StateError) on storage failure.
    fn set_offset(&self, pipeline: &PipelineId, offset: &SourceOffset) -> error::Result<()>;
}

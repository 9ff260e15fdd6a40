//! Pipeline error model and retry backoff policy helpers.

use std::time::Duration;

use edgetide_sdk::StageError;
use edgetide_state::StateError;
use edgetide_types::PipelineStatus;

const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_MAX_MS: u64 = 60_000;

/// Categorized pipeline error.
///
/// Configuration-class errors abort pipeline start and are never
/// retried; `Stage` wraps a cycle-level stage failure and drives the
/// runner's retry decision.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid pipeline or stage configuration, including malformed lane
    /// wiring.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A configured stage is not present in the registry.
    #[error("stage library '{library}' does not define stage '{stage_name}'")]
    UnknownStage {
        library: String,
        stage_name: String,
    },

    /// A stage call failed at the batch level, aborting the cycle.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },

    /// State backend failure (load/persist of state or offsets).
    #[error(transparent)]
    State(#[from] StateError),

    /// The requested status change is not permitted by the state machine.
    #[error("cannot change pipeline status from {from} to {to}")]
    InvalidTransition {
        from: PipelineStatus,
        to: PipelineStatus,
    },
}

impl PipelineError {
    /// Wrap a stage-call failure with the failing instance's name.
    #[must_use]
    pub fn stage(stage: impl Into<String>, source: StageError) -> Self {
        Self::Stage {
            stage: stage.into(),
            source,
        }
    }
}

/// Exponential retry delay for cycle failures: 1 s base, doubling per
/// attempt, capped at 60 s.
#[must_use]
pub fn retry_delay(attempt: u32) -> Duration {
    let delay_ms = BACKOFF_BASE_MS.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    Duration::from_millis(delay_ms.min(BACKOFF_MAX_MS))
}

//! Pipeline lifecycle state model.
//!
//! Pure data types shared by the runner and the state backends. The
//! runner owns all mutation; backends only persist and restore.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque pipeline identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(String);

impl PipelineId {
    /// Create a new pipeline identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for PipelineId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

// ---------------------------------------------------------------------------
// Status state machine
// ---------------------------------------------------------------------------

/// Lifecycle status of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    /// Initial state, or after a configuration change.
    Edited,
    /// Stages are being initialized.
    Starting,
    /// The execution engine is being driven, one cycle at a time.
    Running,
    /// A cycle failed and the runner is backing off before another attempt.
    Retrying,
    /// Stop requested; waiting for the in-flight cycle to complete.
    Stopping,
    /// Stopped on request; all stages destroyed.
    Stopped,
    /// The origin signalled end-of-data.
    Finished,
    /// Terminal failure; requires a manual restart.
    RunError,
    /// The run was interrupted by process shutdown (set at restore time).
    Disconnected,
}

impl PipelineStatus {
    /// Wire-format string for storage and operator display.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edited => "EDITED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Retrying => "RETRYING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Finished => "FINISHED",
            Self::RunError => "RUN_ERROR",
            Self::Disconnected => "DISCONNECTED",
        }
    }

    /// Parse the wire-format string.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "EDITED" => Some(Self::Edited),
            "STARTING" => Some(Self::Starting),
            "RUNNING" => Some(Self::Running),
            "RETRYING" => Some(Self::Retrying),
            "STOPPING" => Some(Self::Stopping),
            "STOPPED" => Some(Self::Stopped),
            "FINISHED" => Some(Self::Finished),
            "RUN_ERROR" => Some(Self::RunError),
            "DISCONNECTED" => Some(Self::Disconnected),
            _ => None,
        }
    }

    /// Whether the state machine permits the transition `self -> next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use PipelineStatus::*;
        match self {
            Edited | Stopped | Finished | RunError | Disconnected => matches!(next, Starting),
            Starting => matches!(next, Running | RunError | Stopping),
            Running => matches!(next, Retrying | Finished | Stopping | RunError | Disconnected),
            Retrying => matches!(next, Running | Stopping | RunError),
            Stopping => matches!(next, Stopped),
        }
    }

    /// A state the runner's thread has exited from (no run in progress).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Edited | Self::Stopped | Self::Finished | Self::RunError | Self::Disconnected
        )
    }

    /// A state with a live run (thread active or stop pending).
    #[must_use]
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pipeline state record
// ---------------------------------------------------------------------------

/// Identity of one execution worker (single entry in this engine; kept as
/// a list for the remote-management collaborators that expect one).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub worker_id: String,
    pub worker_type: String,
}

/// Persisted lifecycle state of one pipeline.
///
/// Owned exclusively by the runner; mutated only through validated
/// status transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub pipeline_id: PipelineId,
    pub status: PipelineStatus,
    pub message: String,
    pub time_stamp: DateTime<Utc>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub worker_infos: Vec<WorkerInfo>,
}

impl PipelineState {
    /// Fresh state for a pipeline that has never run.
    #[must_use]
    pub fn new(pipeline_id: PipelineId) -> Self {
        Self {
            pipeline_id,
            status: PipelineStatus::Edited,
            message: String::new(),
            time_stamp: Utc::now(),
            attributes: BTreeMap::new(),
            worker_infos: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source offset
// ---------------------------------------------------------------------------

/// Current source offset format version.
pub const OFFSET_VERSION: u32 = 1;

/// Opaque, origin-defined progress token for resume-after-restart.
///
/// `None` means the origin has not produced (or has been reset); the
/// engine never interprets the string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOffset {
    pub offset: Option<String>,
    pub version: u32,
}

impl SourceOffset {
    #[must_use]
    pub fn new(offset: Option<String>) -> Self {
        Self {
            offset,
            version: OFFSET_VERSION,
        }
    }
}

impl Default for SourceOffset {
    fn default() -> Self {
        Self::new(None)
    }
}

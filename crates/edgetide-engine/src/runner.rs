//! Pipeline runner: lifecycle state machine, retry policy, offset
//! checkpointing, and graceful shutdown.
//!
//! Each runner drives one pipeline on its own OS thread; cycles execute
//! strictly sequentially and a stop request is observed only between
//! cycles, so a stage never sees a half-finished call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use edgetide_sdk::StageRegistry;
use edgetide_state::StateBackend;
use edgetide_types::{PipelineId, PipelineState, PipelineStatus, SourceOffset};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::types::PipelineConfiguration;
use crate::errors::{retry_delay, PipelineError};
use crate::graph::Pipeline;

/// Default records-per-cycle ceiling handed to the origin.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Granularity of the retry-backoff sleep, so a stop request during
/// `RETRYING` is honored without waiting out the full delay.
const BACKOFF_SLICE: Duration = Duration::from_millis(100);

struct RunnerShared {
    state: Mutex<PipelineState>,
    stop_requested: AtomicBool,
    listeners: Mutex<Vec<mpsc::UnboundedSender<PipelineState>>>,
}

impl RunnerShared {
    /// Apply a validated status transition, persist it, and notify
    /// subscribers. Returns `false` (without mutating) when the state
    /// machine forbids the move; callers racing a stop request treat
    /// that as the stop signal.
    fn transition(
        &self,
        backend: &dyn StateBackend,
        to: PipelineStatus,
        message: impl Into<String>,
    ) -> bool {
        let snapshot = {
            let Ok(mut state) = self.state.lock() else {
                return false;
            };
            if !state.status.can_transition_to(to) {
                tracing::debug!(
                    pipeline = state.pipeline_id.as_str(),
                    from = state.status.as_str(),
                    to = to.as_str(),
                    "Skipping disallowed status transition"
                );
                return false;
            }
            state.status = to;
            state.message = message.into();
            state.time_stamp = Utc::now();
            state.clone()
        };
        tracing::info!(
            pipeline = snapshot.pipeline_id.as_str(),
            status = snapshot.status.as_str(),
            "Pipeline status changed"
        );
        if let Err(e) = backend.save_pipeline_state(&snapshot) {
            tracing::warn!(
                pipeline = snapshot.pipeline_id.as_str(),
                "Failed to persist pipeline state: {e}"
            );
        }
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
        true
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

/// Owns one pipeline's lifecycle.
///
/// `start` spawns the execution thread; `stop` requests a graceful halt
/// at the next cycle boundary; `join` waits for the thread to finish.
pub struct PipelineRunner {
    pipeline_id: PipelineId,
    config: PipelineConfiguration,
    registry: Arc<StageRegistry>,
    backend: Arc<dyn StateBackend>,
    shared: Arc<RunnerShared>,
    max_batch_size: usize,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl PipelineRunner {
    /// Create a runner, restoring persisted state.
    ///
    /// A run interrupted by process shutdown (persisted status still
    /// active) is restored as `DISCONNECTED` so it can be started again.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::State`] when the backend fails.
    pub fn new(
        config: PipelineConfiguration,
        registry: Arc<StageRegistry>,
        backend: Arc<dyn StateBackend>,
    ) -> Result<Self, PipelineError> {
        let pipeline_id = PipelineId::new(config.pipeline_id.as_str());
        let mut state = backend
            .load_pipeline_state(&pipeline_id)?
            .unwrap_or_else(|| PipelineState::new(pipeline_id.clone()));
        if state.status.is_active() {
            state.status = PipelineStatus::Disconnected;
            state.message = "run interrupted by process shutdown".to_string();
            state.time_stamp = Utc::now();
            backend.save_pipeline_state(&state)?;
        }
        Ok(Self {
            pipeline_id,
            config,
            registry,
            backend,
            shared: Arc::new(RunnerShared {
                state: Mutex::new(state),
                stop_requested: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
            }),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            handle: None,
        })
    }

    #[must_use]
    pub fn pipeline_id(&self) -> &PipelineId {
        &self.pipeline_id
    }

    /// Override the per-cycle batch size ceiling.
    pub fn set_max_batch_size(&mut self, max_batch_size: usize) {
        self.max_batch_size = max_batch_size.max(1);
    }

    /// Snapshot of the current pipeline state.
    #[must_use]
    pub fn status(&self) -> PipelineState {
        self.shared
            .state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Subscribe to status-change notifications.
    ///
    /// Every transition is published in order; dropped receivers are
    /// pruned automatically.
    #[must_use]
    pub fn events(&self) -> mpsc::UnboundedReceiver<PipelineState> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut listeners) = self.shared.listeners.lock() {
            listeners.push(tx);
        }
        rx
    }

    /// Start the pipeline with the given runtime parameters.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidTransition`] when the pipeline is not in
    /// a startable state.
    pub fn start(
        &mut self,
        runtime_parameters: HashMap<String, Value>,
    ) -> Result<(), PipelineError> {
        {
            let state = self
                .shared
                .state
                .lock()
                .map_err(|_| PipelineError::Configuration("runner state lock poisoned".into()))?;
            if !state.status.can_transition_to(PipelineStatus::Starting) {
                return Err(PipelineError::InvalidTransition {
                    from: state.status,
                    to: PipelineStatus::Starting,
                });
            }
        }
        // reap a previous run's thread before starting another
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.shared
            .transition(self.backend.as_ref(), PipelineStatus::Starting, "");

        let shared = self.shared.clone();
        let backend = self.backend.clone();
        let registry = self.registry.clone();
        let config = self.config.clone();
        let pipeline_id = self.pipeline_id.clone();
        let max_batch_size = self.max_batch_size;

        let handle = std::thread::Builder::new()
            .name(format!("pipeline-{pipeline_id}"))
            .spawn(move || {
                run_pipeline_thread(
                    &shared,
                    backend.as_ref(),
                    &registry,
                    &config,
                    &pipeline_id,
                    &runtime_parameters,
                    max_batch_size,
                );
            })
            .map_err(|e| PipelineError::Configuration(format!("failed to spawn runner thread: {e}")))?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Request a graceful stop, honored at the next cycle boundary.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidTransition`] when no run is active.
    pub fn stop(&self) -> Result<(), PipelineError> {
        let from = self.status().status;
        if !from.can_transition_to(PipelineStatus::Stopping) {
            return Err(PipelineError::InvalidTransition {
                from,
                to: PipelineStatus::Stopping,
            });
        }
        self.shared
            .transition(self.backend.as_ref(), PipelineStatus::Stopping, "stop requested");
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Wait for the execution thread to finish and return the final
    /// state.
    #[must_use]
    pub fn join(&mut self) -> PipelineState {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.status()
    }
}

impl Drop for PipelineRunner {
    fn drop(&mut self) {
        // a live run would outlive its owner otherwise
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_pipeline_thread(
    shared: &RunnerShared,
    backend: &dyn StateBackend,
    registry: &StageRegistry,
    config: &PipelineConfiguration,
    pipeline_id: &PipelineId,
    runtime_parameters: &HashMap<String, Value>,
    max_batch_size: usize,
) {
    let mut pipeline = match Pipeline::build(config, registry, runtime_parameters) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!(pipeline = pipeline_id.as_str(), "Pipeline build failed: {e}");
            terminal_transition(shared, backend, PipelineStatus::RunError, e.to_string());
            return;
        }
    };
    if let Err(e) = pipeline.init() {
        tracing::error!(pipeline = pipeline_id.as_str(), "Stage init failed: {e}");
        pipeline.destroy();
        terminal_transition(shared, backend, PipelineStatus::RunError, e.to_string());
        return;
    }

    let mut current_offset = match backend.get_offset(pipeline_id) {
        Ok(offset) => offset.and_then(|o| o.offset),
        Err(e) => {
            tracing::error!(pipeline = pipeline_id.as_str(), "Offset load failed: {e}");
            pipeline.destroy();
            terminal_transition(shared, backend, PipelineStatus::RunError, e.to_string());
            return;
        }
    };
    if let Some(offset) = &current_offset {
        tracing::info!(
            pipeline = pipeline_id.as_str(),
            offset,
            "Resuming from committed offset"
        );
    }

    let should_retry = pipeline.bean().should_retry;
    let retry_attempts = pipeline.bean().retry_attempts;
    shared.transition(backend, PipelineStatus::Running, "");

    let mut attempt: u32 = 0;
    let mut finished = false;
    loop {
        if shared.stop_requested() {
            break;
        }
        match pipeline.run_cycle(current_offset.as_deref(), max_batch_size) {
            Ok(result) => {
                attempt = 0;
                if let Err(e) =
                    backend.set_offset(pipeline_id, &SourceOffset::new(result.new_offset.clone()))
                {
                    tracing::warn!(
                        pipeline = pipeline_id.as_str(),
                        "Offset commit failed: {e}"
                    );
                }
                current_offset = result.new_offset;
                if result.end_of_data {
                    tracing::info!(
                        pipeline = pipeline_id.as_str(),
                        "Origin signalled end-of-data"
                    );
                    finished = true;
                    break;
                }
            }
            Err(e) => {
                let attempts_left =
                    retry_attempts < 0 || i64::from(attempt) < retry_attempts;
                if should_retry && attempts_left {
                    attempt += 1;
                    tracing::warn!(
                        pipeline = pipeline_id.as_str(),
                        attempt,
                        "Cycle failed, retrying: {e}"
                    );
                    shared.transition(
                        backend,
                        PipelineStatus::Retrying,
                        format!("retry attempt {attempt}: {e}"),
                    );
                    sleep_with_stop_checks(shared, retry_delay(attempt));
                    if shared.stop_requested() {
                        break;
                    }
                    shared.transition(backend, PipelineStatus::Running, "");
                } else {
                    tracing::error!(pipeline = pipeline_id.as_str(), "Cycle failed: {e}");
                    pipeline.destroy();
                    terminal_transition(shared, backend, PipelineStatus::RunError, e.to_string());
                    return;
                }
            }
        }
    }

    pipeline.destroy();
    if finished {
        terminal_transition(shared, backend, PipelineStatus::Finished, String::new());
    } else {
        shared.transition(backend, PipelineStatus::Stopped, "");
    }
}

/// Land on the intended terminal status, falling back to `STOPPED` when
/// a concurrent stop request already moved the pipeline to `STOPPING`.
fn terminal_transition(
    shared: &RunnerShared,
    backend: &dyn StateBackend,
    intended: PipelineStatus,
    message: String,
) {
    if !shared.transition(backend, intended, message.clone()) {
        shared.transition(backend, PipelineStatus::Stopped, message);
    }
}

/// Sleep in slices, returning early once a stop is requested.
fn sleep_with_stop_checks(shared: &RunnerShared, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() {
        if shared.stop_requested() {
            return;
        }
        let slice = remaining.min(BACKOFF_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}

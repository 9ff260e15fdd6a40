//! One source-to-sink execution cycle over an assembled pipeline.

use std::collections::HashMap;

use edgetide_sdk::{Batch, BatchMaker};
use edgetide_types::Record;

use crate::errors::PipelineError;
use crate::graph::{DownstreamKind, Pipeline};

/// Outcome of one execution cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleResult {
    /// Offset to commit; `None` when the origin signalled end-of-data.
    pub new_offset: Option<String>,
    /// The origin reported no further data.
    pub end_of_data: bool,
    pub records_produced: usize,
    pub records_errored: usize,
}

impl Pipeline {
    /// Drive exactly one cycle: origin produce, processors in
    /// topological lane order, destination writes, then delivery of any
    /// `to_error` records to the error-handling destination.
    ///
    /// Records preserve FIFO order within a lane; a lane consumed by
    /// several stages hands each non-final consumer a deep clone so no
    /// branch sees another's mutations.
    ///
    /// # Errors
    ///
    /// A batch-level stage failure aborts the cycle with
    /// [`PipelineError::Stage`]; records already routed through
    /// `to_error` stay queued in the sink for the next delivery.
    pub fn run_cycle(
        &mut self,
        last_offset: Option<&str>,
        max_batch_size: usize,
    ) -> Result<CycleResult, PipelineError> {
        let mut maker = BatchMaker::new(self.origin.conf.output_lanes.clone());
        let new_offset = self
            .origin
            .stage
            .produce(&mut self.origin.context, last_offset, max_batch_size, &mut maker)
            .map_err(|e| PipelineError::stage(self.origin.conf.instance_name.as_str(), e))?;

        let records_produced = maker.total_records();
        let end_of_data = new_offset.is_none();
        let mut lane_queues: HashMap<String, Vec<Record>> = maker.into_lanes();
        let mut remaining = self.lane_consumers.clone();

        tracing::debug!(
            pipeline = self.pipeline_id(),
            records = records_produced,
            offset = new_offset.as_deref().unwrap_or("<end>"),
            "Origin produced batch"
        );

        for stage in &mut self.downstream {
            let mut records = Vec::new();
            for lane in &stage.conf.input_lanes {
                let queue = lane_queues.entry(lane.clone()).or_default();
                match remaining.get_mut(lane) {
                    // the final consumer takes ownership, earlier ones clone
                    Some(count) if *count > 1 => {
                        *count -= 1;
                        records.extend(queue.iter().cloned());
                    }
                    _ => records.append(queue),
                }
            }
            let batch = Batch::new(records, new_offset.clone());

            match &mut stage.kind {
                DownstreamKind::Processor(processor) => {
                    let mut maker = BatchMaker::new(stage.conf.output_lanes.clone());
                    processor
                        .process(&mut stage.context, &batch, &mut maker)
                        .map_err(|e| PipelineError::stage(stage.conf.instance_name.as_str(), e))?;
                    for (lane, records) in maker.into_lanes() {
                        lane_queues.entry(lane).or_default().extend(records);
                    }
                }
                DownstreamKind::Destination(destination) => {
                    destination
                        .write(&mut stage.context, &batch)
                        .map_err(|e| PipelineError::stage(stage.conf.instance_name.as_str(), e))?;
                }
            }
        }

        let errored: Vec<Record> = match self.error_sink.lock() {
            Ok(mut sink) => sink.drain(..).collect(),
            Err(_) => {
                tracing::warn!(pipeline = self.pipeline_id(), "Error sink lock poisoned");
                Vec::new()
            }
        };
        let records_errored = errored.len();
        if !errored.is_empty() {
            tracing::debug!(
                pipeline = self.pipeline_id(),
                records = records_errored,
                stage = self.error_stage.conf.instance_name,
                "Delivering error records"
            );
            let batch = Batch::new(errored, new_offset.clone());
            self.error_stage
                .stage
                .write(&mut self.error_stage.context, &batch)
                .map_err(|e| PipelineError::stage(self.error_stage.conf.instance_name.as_str(), e))?;
        }

        Ok(CycleResult {
            new_offset,
            end_of_data,
            records_produced,
            records_errored,
        })
    }
}

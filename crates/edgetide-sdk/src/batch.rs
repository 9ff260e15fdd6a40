//! Batch and lane primitives.

use std::collections::HashMap;

use edgetide_types::Record;

use crate::error::StageError;

/// An ordered, consumer-read-only sequence of records produced by one
/// origin poll. Exists only for the duration of one execution cycle.
#[derive(Debug, Default)]
pub struct Batch {
    records: Vec<Record>,
    source_offset: Option<String>,
}

impl Batch {
    /// Create a batch over `records`, tagged with the offset in effect.
    #[must_use]
    pub fn new(records: Vec<Record>, source_offset: Option<String>) -> Self {
        Self {
            records,
            source_offset,
        }
    }

    /// The records in FIFO order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The source offset this batch was produced under.
    #[must_use]
    pub fn source_offset(&self) -> Option<&str> {
        self.source_offset.as_deref()
    }

    /// Consume the batch, yielding its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Per-invocation output accumulator.
///
/// A stage emits records onto its declared output lanes; the engine
/// drains the maker after the call and queues each lane's records for
/// the stages wired to consume it. Records keep their append order.
#[derive(Debug)]
pub struct BatchMaker {
    lanes: Vec<String>,
    output: HashMap<String, Vec<Record>>,
}

impl BatchMaker {
    /// A maker accepting exactly the given output lanes.
    #[must_use]
    pub fn new(lanes: Vec<String>) -> Self {
        let output = lanes.iter().map(|lane| (lane.clone(), Vec::new())).collect();
        Self { lanes, output }
    }

    /// The lanes this maker accepts, in declaration order.
    #[must_use]
    pub fn lanes(&self) -> &[String] {
        &self.lanes
    }

    /// Append a record to `lane`, or to the stage's first declared lane
    /// when `lane` is `None`.
    ///
    /// # Errors
    ///
    /// [`StageError::UnknownLane`] for an undeclared lane (validated
    /// pipelines never hit this) and [`StageError::NoOutputLanes`] when
    /// defaulting with no lanes declared.
    pub fn add_record(&mut self, record: Record, lane: Option<&str>) -> Result<(), StageError> {
        let lane = match lane {
            Some(lane) => lane,
            None => self.lanes.first().ok_or(StageError::NoOutputLanes)?,
        };
        match self.output.get_mut(lane) {
            Some(records) => {
                records.push(record);
                Ok(())
            }
            None => Err(StageError::UnknownLane {
                lane: lane.to_string(),
            }),
        }
    }

    /// Total records emitted so far, across all lanes.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.output.values().map(Vec::len).sum()
    }

    /// Consume the maker, yielding each lane's records.
    #[must_use]
    pub fn into_lanes(self) -> HashMap<String, Vec<Record>> {
        self.output
    }
}

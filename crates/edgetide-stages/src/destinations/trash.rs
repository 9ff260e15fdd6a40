//! Null destination: acknowledges and discards every record.
//!
//! Also serves as the default error-handling destination.

use edgetide_sdk::{Batch, Destination, Stage, StageContext, StageError};

pub const STAGE_NAME: &str = "trash";

pub struct TrashDestination;

impl Stage for TrashDestination {}

impl Destination for TrashDestination {
    fn write(&mut self, ctx: &mut StageContext, batch: &Batch) -> Result<(), StageError> {
        tracing::debug!(
            stage = ctx.instance_name(),
            records = batch.len(),
            "Discarding batch"
        );
        Ok(())
    }
}

//! The stage contract.
//!
//! Three roles share one base lifecycle: `init` binds and validates
//! configuration, `destroy` releases resources and runs on every exit
//! path for every stage whose `init` was invoked.

use crate::batch::{Batch, BatchMaker};
use crate::context::StageContext;
use crate::error::StageError;

/// Base lifecycle common to all stage roles.
pub trait Stage: Send {
    /// One-time setup; validates and binds configuration. A failure here
    /// aborts pipeline start without retry.
    fn init(&mut self, _ctx: &mut StageContext) -> Result<(), StageError> {
        Ok(())
    }

    /// Release resources acquired in `init`. Invoked exactly once on
    /// every stage that was inited, on every shutdown path.
    fn destroy(&mut self, _ctx: &mut StageContext) -> Result<(), StageError> {
        Ok(())
    }
}

/// A stage that produces records from a source and tracks a resumable
/// offset.
pub trait Origin: Stage {
    /// Pull up to `max_batch_size` records, emitting them through
    /// `maker`, and return the new offset token. The token is opaque to
    /// the engine; `Ok(None)` signals end-of-data (records emitted in
    /// the same call are still delivered).
    fn produce(
        &mut self,
        ctx: &mut StageContext,
        last_offset: Option<&str>,
        max_batch_size: usize,
        maker: &mut BatchMaker,
    ) -> Result<Option<String>, StageError>;
}

/// A stage that transforms or routes records between lanes.
pub trait Processor: Stage {
    /// Consume the input batch and write zero or more output records per
    /// lane. Must be idempotent with respect to retried batches when the
    /// pipeline retries cycles.
    fn process(
        &mut self,
        ctx: &mut StageContext,
        batch: &Batch,
        maker: &mut BatchMaker,
    ) -> Result<(), StageError>;
}

/// A stage that delivers records to an external sink.
pub trait Destination: Stage {
    /// Deliver the batch. Per-record failures are reported via
    /// `ctx.to_error` without failing the call; a connection-level
    /// failure fails the whole call and aborts the cycle.
    fn write(&mut self, ctx: &mut StageContext, batch: &Batch) -> Result<(), StageError>;
}

/// Role of a stage instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    Origin,
    Processor,
    Destination,
}

impl std::fmt::Display for StageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Origin => "origin",
            Self::Processor => "processor",
            Self::Destination => "destination",
        };
        f.write_str(s)
    }
}

/// A constructed stage, polymorphic over its role.
pub enum StageInstance {
    Origin(Box<dyn Origin>),
    Processor(Box<dyn Processor>),
    Destination(Box<dyn Destination>),
}

impl StageInstance {
    #[must_use]
    pub fn role(&self) -> StageRole {
        match self {
            Self::Origin(_) => StageRole::Origin,
            Self::Processor(_) => StageRole::Processor,
            Self::Destination(_) => StageRole::Destination,
        }
    }

    /// Dispatch `init` regardless of role.
    pub fn init(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        match self {
            Self::Origin(stage) => stage.init(ctx),
            Self::Processor(stage) => stage.init(ctx),
            Self::Destination(stage) => stage.init(ctx),
        }
    }

    /// Dispatch `destroy` regardless of role.
    pub fn destroy(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        match self {
            Self::Origin(stage) => stage.destroy(ctx),
            Self::Processor(stage) => stage.destroy(ctx),
            Self::Destination(stage) => stage.destroy(ctx),
        }
    }
}

impl std::fmt::Debug for StageInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StageInstance").field(&self.role()).finish()
    }
}

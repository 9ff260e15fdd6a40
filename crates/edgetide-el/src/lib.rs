//! Expression-language (EL) evaluator.
//!
//! Configuration strings of the form `${...}` are evaluated against a
//! typed [`ElContext`] at the point the owning stage consumes them.
//! Anything else passes through verbatim. There is no compile step:
//! expressions are parsed per call, which keeps stage configuration
//! plain strings end to end.

pub mod context;
pub mod error;
pub mod evaluator;
pub mod functions;

pub use context::ElContext;
pub use error::{ElError, RECORD_CONTEXT_MSG};
pub use evaluator::{is_el_string, ElFunction, Evaluator};

//! Edit history
//!
//! Atomic operations, undo steps, merge coalescing and the undo/redo log.

mod merge;
mod operation;
mod snapshot;
mod step;
mod undo_log;

pub use operation::{Edit, OpIdentity, Operation, OperationKind};
pub use snapshot::DocumentSnapshot;
pub use step::{HistoryStep, RecordOutcome, SkippedOperation, StepPayload, StepReport};
pub use undo_log::History;

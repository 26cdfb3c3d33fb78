use std::collections::HashSet;

use super::operation::Operation;
use super::snapshot::DocumentSnapshot;
use crate::core_types::StepId;
use crate::model::NodeId;

/// What undoing or redoing a step replays
#[derive(Debug, Clone, PartialEq)]
pub enum StepPayload {
    /// Operations in commit order; undo applies inverses in reverse
    Operations(Vec<Operation>),
    /// Whole-document states on either side of the step
    Snapshot {
        before: DocumentSnapshot,
        after: DocumentSnapshot,
    },
}

/// One undo unit
///
/// Immutable once pushed onto the undo stack.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStep {
    pub id: StepId,
    pub description: String,
    pub created_at_ms: u64,
    pub payload: StepPayload,
}

impl HistoryStep {
    pub(crate) fn operations(description: impl Into<String>, created_at_ms: u64, ops: Vec<Operation>) -> Self {
        Self {
            id: StepId::new(),
            description: description.into(),
            created_at_ms,
            payload: StepPayload::Operations(ops),
        }
    }

    pub(crate) fn snapshot(
        description: impl Into<String>,
        created_at_ms: u64,
        before: DocumentSnapshot,
        after: DocumentSnapshot,
    ) -> Self {
        Self {
            id: StepId::new(),
            description: description.into(),
            created_at_ms,
            payload: StepPayload::Snapshot { before, after },
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self.payload, StepPayload::Snapshot { .. })
    }

    /// Operations carried by the step; empty for snapshot steps
    pub fn ops(&self) -> &[Operation] {
        match &self.payload {
            StepPayload::Operations(ops) => ops,
            StepPayload::Snapshot { .. } => &[],
        }
    }

    pub fn op_count(&self) -> usize {
        self.ops().len()
    }

    pub(crate) fn collect_nodes(&self, out: &mut HashSet<NodeId>) {
        for op in self.ops() {
            out.extend(op.referenced_nodes());
        }
    }
}

/// An operation left out of an undo or redo because its precondition failed
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedOperation {
    pub identity: String,
    pub reason: String,
}

/// Outcome of a successful undo or redo
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step_id: StepId,
    pub description: String,
    pub applied: usize,
    pub skipped: Vec<SkippedOperation>,
    /// The document was replaced from a snapshot; node handles held by
    /// callers must be re-resolved
    pub restored_from_snapshot: bool,
}

impl StepReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// What happened to a recorded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Committed to the open batch or a new step
    Committed,
    /// Held for merging until its window elapses
    Queued,
    /// Dropped as a repeat of an operation already recorded in the window
    Duplicate,
}

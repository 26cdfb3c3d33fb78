use std::collections::{HashSet, VecDeque};

use super::merge::MergeQueue;
use super::operation::Operation;
use super::snapshot::DocumentSnapshot;
use super::step::{HistoryStep, RecordOutcome, SkippedOperation, StepPayload, StepReport};
use crate::config::{Discipline, HistoryConfig};
use crate::core_types::schema::{OP_REDO, OP_UNDO};
use crate::core_types::StepId;
use crate::errors::{ArborError, Result};
use crate::model::{Document, NodeId};
use crate::{log_op_end, log_op_error, log_op_start};

#[derive(Debug, Clone)]
struct OpenBatch {
    description: String,
    created_at_ms: u64,
    ops: Vec<Operation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

impl Direction {
    fn op_name(self) -> &'static str {
        match self {
            Direction::Undo => OP_UNDO,
            Direction::Redo => OP_REDO,
        }
    }
}

/// Undo/redo log
///
/// Records edits already applied to a document and replays them backwards or
/// forwards. One recording discipline is fixed per history by configuration:
///
/// - **Operations**: [`History::record_operation`] commits invertible
///   operations; undo applies inverses, so node handles stay valid.
/// - **Snapshots**: [`History::add_snapshot_step`] captures the whole
///   document; undo restores the captured state.
///
/// Field modifications are held in merge groups until their window elapses
/// ([`History::poll`]), until a batch boundary, or until the next undo, redo or
/// non-mergeable operation.
#[derive(Debug, Clone)]
pub struct History {
    config: HistoryConfig,
    undo: VecDeque<HistoryStep>,
    redo: Vec<HistoryStep>,
    batch: Option<OpenBatch>,
    pending: MergeQueue,
    /// Most recent commit; cleared by undo and redo
    last_committed: Option<Operation>,
    baseline: Option<DocumentSnapshot>,
    committed: Vec<StepId>,
}

impl History {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            pending: MergeQueue::new(config.merge_window_ms),
            config,
            undo: VecDeque::new(),
            redo: Vec::new(),
            batch: None,
            last_committed: None,
            baseline: None,
            committed: Vec::new(),
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn discipline(&self) -> Discipline {
        self.config.discipline
    }

    fn require(&self, attempted: Discipline) -> Result<()> {
        if self.config.discipline == attempted {
            Ok(())
        } else {
            Err(ArborError::DisciplineMismatch {
                configured: self.config.discipline.as_str().to_string(),
                attempted: attempted.as_str().to_string(),
            })
        }
    }

    // ===== Recording =====

    /// Record an operation that has already been applied to the document
    ///
    /// Field modifications are queued for merging (unless the merge window is
    /// zero). Other operations are dropped if they repeat the last commit
    /// within the window; otherwise pending merge groups are flushed and the
    /// operation commits to the open batch or a new step.
    ///
    /// # Errors
    ///
    /// Returns `DisciplineMismatch` for a snapshot-discipline history.
    pub fn record_operation(&mut self, op: Operation) -> Result<RecordOutcome> {
        self.require(Discipline::Operations)?;

        if op.is_mergeable() && self.config.merge_window_ms > 0 {
            if let Err(op) = self.pending.push(op) {
                self.commit(op);
                return Ok(RecordOutcome::Committed);
            }
            return Ok(RecordOutcome::Queued);
        }

        if self.is_duplicate(&op) {
            tracing::debug!(identity = %op.identity(), "duplicate operation dropped");
            return Ok(RecordOutcome::Duplicate);
        }
        self.flush_pending();
        self.commit(op);
        Ok(RecordOutcome::Committed)
    }

    /// A non-mergeable operation repeats the last commit when both edits are
    /// equal inside the window with nothing committed or queued in between
    fn is_duplicate(&self, op: &Operation) -> bool {
        let window = self.config.merge_window_ms;
        if window == 0 || op.is_mergeable() || !self.pending.is_empty() {
            return false;
        }
        self.last_committed.as_ref().is_some_and(|last| {
            last.edit == op.edit && op.timestamp_ms.saturating_sub(last.timestamp_ms) <= window
        })
    }

    fn commit(&mut self, op: Operation) {
        self.last_committed = Some(op.clone());
        if let Some(batch) = self.batch.as_mut() {
            batch.ops.push(op);
            self.redo.clear();
            return;
        }
        let description = op.kind().as_str().to_string();
        let created_at_ms = op.timestamp_ms;
        self.push_step(HistoryStep::operations(description, created_at_ms, vec![op]));
    }

    fn push_step(&mut self, step: HistoryStep) {
        tracing::debug!(
            step_id = %step.id,
            description = %step.description,
            op_count = step.op_count(),
            "history step committed"
        );
        self.committed.push(step.id.clone());
        self.undo.push_back(step);
        self.redo.clear();
        self.enforce_bound();
    }

    fn enforce_bound(&mut self) {
        while self.undo.len() > self.config.max_steps {
            if let Some(dropped) = self.undo.pop_front() {
                tracing::debug!(step_id = %dropped.id, "oldest history step dropped");
            }
        }
    }

    /// Commit merge groups whose window has elapsed; returns how many
    /// operations committed
    pub fn poll(&mut self, now_ms: u64) -> usize {
        let due = self.pending.take_due(now_ms);
        let count = due.len();
        for op in due {
            self.commit(op);
        }
        count
    }

    /// Commit every pending merge group now
    pub fn flush_pending(&mut self) -> usize {
        let ops = self.pending.take_all();
        let count = ops.len();
        for op in ops {
            self.commit(op);
        }
        count
    }

    // ===== Batching =====

    /// Open a batch; every commit until [`History::end_batch`] joins one step
    ///
    /// Batches do not nest: an open batch is closed (and pushed if non-empty)
    /// first.
    ///
    /// # Errors
    ///
    /// Returns `DisciplineMismatch` for a snapshot-discipline history.
    pub fn begin_batch(&mut self, description: impl Into<String>, now_ms: u64) -> Result<()> {
        self.require(Discipline::Operations)?;
        self.flush_pending();
        if let Some(open) = self.batch.as_ref() {
            tracing::warn!(
                description = %open.description,
                op_count = open.ops.len(),
                "batch still open, force-closing it"
            );
            self.close_batch();
        }
        self.batch = Some(OpenBatch {
            description: description.into(),
            created_at_ms: now_ms,
            ops: Vec::new(),
        });
        Ok(())
    }

    /// Close the open batch; returns the step id if it was pushed
    pub fn end_batch(&mut self) -> Option<StepId> {
        if self.batch.is_none() {
            return None;
        }
        self.flush_pending();
        self.close_batch()
    }

    fn close_batch(&mut self) -> Option<StepId> {
        let batch = self.batch.take()?;
        if batch.ops.is_empty() {
            tracing::debug!(description = %batch.description, "empty batch discarded");
            return None;
        }
        let step = HistoryStep::operations(batch.description, batch.created_at_ms, batch.ops);
        let id = step.id.clone();
        self.push_step(step);
        Some(id)
    }

    pub fn is_batch_open(&self) -> bool {
        self.batch.is_some()
    }

    // ===== Snapshots =====

    /// Set the state the next snapshot step starts from
    ///
    /// # Errors
    ///
    /// Returns `DisciplineMismatch` for an operation-discipline history and
    /// `Serialization` if the document cannot be encoded.
    pub fn set_baseline(&mut self, doc: &Document) -> Result<()> {
        self.require(Discipline::Snapshots)?;
        self.baseline = Some(DocumentSnapshot::capture(doc)?);
        Ok(())
    }

    /// Capture the document as a snapshot step against the baseline
    ///
    /// Returns `None` when the document is unchanged since the baseline (or
    /// when no baseline existed, in which case the capture becomes it).
    ///
    /// # Errors
    ///
    /// Returns `DisciplineMismatch` for an operation-discipline history and
    /// `Serialization` if the document cannot be encoded.
    pub fn add_snapshot_step(
        &mut self,
        doc: &Document,
        description: impl Into<String>,
        now_ms: u64,
    ) -> Result<Option<StepId>> {
        self.require(Discipline::Snapshots)?;
        let after = DocumentSnapshot::capture(doc)?;

        let Some(before) = self.baseline.take() else {
            self.baseline = Some(after);
            return Ok(None);
        };
        if before.digest() == after.digest() {
            tracing::debug!("document unchanged, snapshot step skipped");
            self.baseline = Some(before);
            return Ok(None);
        }

        self.baseline = Some(after.clone());
        let step = HistoryStep::snapshot(description, now_ms, before, after);
        let id = step.id.clone();
        self.push_step(step);
        Ok(Some(id))
    }

    // ===== Undo / redo =====

    /// Revert the most recent step
    ///
    /// Pending merge groups and an open batch are committed first. Operation
    /// steps replay against a working copy: an operation whose precondition
    /// fails is skipped and reported, any other failure discards the working
    /// copy and leaves the document and both stacks untouched.
    ///
    /// Returns `None` when there is nothing to undo.
    ///
    /// # Errors
    ///
    /// Returns `ReplayFailed`, or a snapshot restore error
    /// (`SnapshotDigestMismatch`, `Serialization`).
    pub fn undo(&mut self, doc: &mut Document) -> Result<Option<StepReport>> {
        self.step(doc, Direction::Undo)
    }

    /// Re-apply the most recently undone step
    ///
    /// # Errors
    ///
    /// Same as [`History::undo`].
    pub fn redo(&mut self, doc: &mut Document) -> Result<Option<StepReport>> {
        self.step(doc, Direction::Redo)
    }

    fn step(&mut self, doc: &mut Document, direction: Direction) -> Result<Option<StepReport>> {
        let op_name = direction.op_name();
        self.flush_pending();
        self.last_committed = None;
        if self.batch.is_some() {
            tracing::debug!(op = op_name, "closing open batch before replay");
            self.close_batch();
        }

        let step = match direction {
            Direction::Undo => self.undo.back(),
            Direction::Redo => self.redo.last(),
        };
        let Some(step) = step else {
            return Ok(None);
        };

        let start = std::time::Instant::now();
        log_op_start!(op_name, step_id = %step.id, op_count = step.op_count());

        match replay(step, doc, direction) {
            Ok((replayed, report)) => {
                *doc = replayed;
                self.finish_step(direction, &report);
                log_op_end!(
                    op_name,
                    started = start,
                    step_id = %report.step_id,
                    skipped = report.skipped.len()
                );
                Ok(Some(report))
            }
            Err(e) => {
                log_op_error!(op_name, e.clone(), started = start);
                Err(e)
            }
        }
    }

    /// Move the replayed step to the opposite stack and realign the snapshot
    /// baseline
    fn finish_step(&mut self, direction: Direction, report: &StepReport) {
        let moved = match direction {
            Direction::Undo => self.undo.pop_back(),
            Direction::Redo => self.redo.pop(),
        };
        let Some(step) = moved else {
            return;
        };
        debug_assert_eq!(step.id, report.step_id);

        if let StepPayload::Snapshot { before, after } = &step.payload {
            self.baseline = Some(match direction {
                Direction::Undo => before.clone(),
                Direction::Redo => after.clone(),
            });
        }
        match direction {
            Direction::Undo => self.redo.push(step),
            Direction::Redo => {
                self.undo.push_back(step);
                self.enforce_bound();
            }
        }
    }

    // ===== Introspection =====

    /// There is a step to undo, committed or about to be
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
            || !self.pending.is_empty()
            || self.batch.as_ref().is_some_and(|b| !b.ops.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Merge groups waiting for their window to elapse
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Undo stack, oldest first
    pub fn steps(&self) -> impl Iterator<Item = &HistoryStep> + '_ {
        self.undo.iter()
    }

    /// Redo stack, next redo last
    pub fn redo_steps(&self) -> &[HistoryStep] {
        &self.redo
    }

    pub fn top_step_id(&self) -> Option<&StepId> {
        self.undo.back().map(|s| &s.id)
    }

    /// Steps pushed onto the undo stack since the last call
    pub fn drain_committed(&mut self) -> Vec<StepId> {
        std::mem::take(&mut self.committed)
    }

    /// Every node handle a recorded operation may need to replay
    pub fn referenced_nodes(&self) -> HashSet<NodeId> {
        let mut nodes = HashSet::new();
        for step in self.undo.iter().chain(self.redo.iter()) {
            step.collect_nodes(&mut nodes);
        }
        if let Some(batch) = &self.batch {
            for op in &batch.ops {
                nodes.extend(op.referenced_nodes());
            }
        }
        let mut pending = Vec::new();
        self.pending.referenced_nodes(&mut pending);
        nodes.extend(pending);
        nodes
    }

    /// Forget everything, including pending merges and the open batch
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.batch = None;
        self.pending.clear();
        self.last_committed = None;
        self.committed.clear();
    }
}

/// Replay one step onto a copy of the document
fn replay(step: &HistoryStep, doc: &Document, direction: Direction) -> Result<(Document, StepReport)> {
    let mut report = StepReport {
        step_id: step.id.clone(),
        description: step.description.clone(),
        applied: 0,
        skipped: Vec::new(),
        restored_from_snapshot: false,
    };

    let ops = match &step.payload {
        StepPayload::Snapshot { before, after } => {
            let target = match direction {
                Direction::Undo => before,
                Direction::Redo => after,
            };
            let restored = target.restore()?;
            report.restored_from_snapshot = true;
            return Ok((restored, report));
        }
        StepPayload::Operations(ops) => ops,
    };

    let mut working = doc.clone();
    let ordered: Vec<&Operation> = match direction {
        Direction::Undo => ops.iter().rev().collect(),
        Direction::Redo => ops.iter().collect(),
    };
    for op in ordered {
        let check = match direction {
            Direction::Undo => op.check_undo(&working),
            Direction::Redo => op.check_redo(&working),
        };
        if let Err(e) = check {
            tracing::warn!(
                op = direction.op_name(),
                identity = %op.identity(),
                reason = %e,
                "operation skipped"
            );
            report.skipped.push(SkippedOperation {
                identity: op.identity().to_string(),
                reason: e.to_string(),
            });
            continue;
        }
        let applied = match direction {
            Direction::Undo => op.undo(&mut working),
            Direction::Redo => op.execute(&mut working),
        };
        applied.map_err(|e| ArborError::ReplayFailed {
            step_id: step.id.to_string(),
            reason: format!("{}: {}", op.identity(), e),
        })?;
        report.applied += 1;
    }
    Ok((working, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Edit;
    use crate::model::{NodeRecord, Value};
    use crate::path::NodePath;

    fn config(max_steps: usize, merge_window_ms: u64) -> HistoryConfig {
        HistoryConfig {
            max_steps,
            merge_window_ms,
            discipline: Discipline::Operations,
        }
    }

    fn set_title(doc: &mut Document, node: NodeId, title: &str, ts: u64) -> Operation {
        let member = NodePath::empty().field("Title");
        let old = doc.set_member(node, &member, Value::from(title)).unwrap();
        Operation::new(
            Edit::FieldModify {
                node,
                member,
                old,
                new: Value::from(title),
            },
            ts,
        )
    }

    #[test]
    fn test_undo_missing_target_is_skipped_and_reported() {
        let mut doc = Document::new();
        let node = doc.create_node(NodeRecord::new("Item"));
        let mut history = History::new(config(10, 0));

        let op = set_title(&mut doc, node, "x", 1);
        history.record_operation(op).unwrap();
        doc.purge_unreachable(&HashSet::new());

        let report = history.undo(&mut doc).unwrap().unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(history.redo_depth(), 1);
    }

    #[test]
    fn test_hard_failure_leaves_state_untouched() {
        let mut doc = Document::new();
        let root = doc.create_node(NodeRecord::new("Group"));
        doc.insert_node(&NodePath::root(0), root).unwrap();
        let mut history = History::new(config(10, 0));

        // Recorded at a path the node was never inserted at
        let bogus = Operation::new(
            Edit::NodeMove {
                node: root,
                from: NodePath::root(3),
                to: NodePath::root(0),
            },
            1,
        );
        history.record_operation(bogus).unwrap();
        let before = doc.clone();

        let err = history.undo(&mut doc).unwrap_err();
        assert!(matches!(err, ArborError::ReplayFailed { .. }));
        assert_eq!(doc, before);
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.redo_depth(), 0);
    }

    #[test]
    fn test_duplicate_non_mergeable_dropped_in_window() {
        let mut doc = Document::new();
        let node = doc.create_node(NodeRecord::new("Item"));
        doc.insert_node(&NodePath::root(0), node).unwrap();
        let mut history = History::new(config(10, 100));
        let create = Operation::new(
            Edit::NodeCreate {
                node,
                at: NodePath::root(0),
            },
            1,
        );

        assert_eq!(history.record_operation(create.clone()).unwrap(), RecordOutcome::Committed);
        assert_eq!(history.record_operation(create.clone()).unwrap(), RecordOutcome::Duplicate);

        let later = Operation::new(create.edit.clone(), 500);
        assert_eq!(history.record_operation(later).unwrap(), RecordOutcome::Committed);
        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn test_repeat_after_other_commit_is_not_duplicate() {
        let mut doc = Document::new();
        let node = doc.create_node(NodeRecord::new("Item"));
        let mut history = History::new(config(10, 100));
        let at = NodePath::root(0);
        let create = Operation::new(Edit::NodeCreate { node, at: at.clone() }, 1);
        let delete = Operation::new(Edit::NodeDelete { node, at }, 2);

        assert_eq!(history.record_operation(create.clone()).unwrap(), RecordOutcome::Committed);
        assert_eq!(history.record_operation(delete).unwrap(), RecordOutcome::Committed);
        assert_eq!(history.record_operation(create.clone()).unwrap(), RecordOutcome::Committed);
        assert_eq!(history.record_operation(create).unwrap(), RecordOutcome::Duplicate);
        assert_eq!(history.undo_depth(), 3);
    }

    #[test]
    fn test_poll_commits_after_window() {
        let mut doc = Document::new();
        let node = doc.create_node(NodeRecord::new("Item"));
        let mut history = History::new(config(10, 100));

        let op = set_title(&mut doc, node, "a", 10);
        assert_eq!(history.record_operation(op).unwrap(), RecordOutcome::Queued);
        assert_eq!(history.poll(50), 0);
        assert_eq!(history.pending_len(), 1);
        assert_eq!(history.poll(110), 1);
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.drain_committed().len(), 1);
    }

    #[test]
    fn test_snapshot_api_rejected_in_operation_mode() {
        let mut history = History::new(config(10, 0));
        let err = history
            .add_snapshot_step(&Document::new(), "s", 0)
            .unwrap_err();
        assert!(matches!(err, ArborError::DisciplineMismatch { .. }));
    }

    #[test]
    fn test_snapshot_steps_restore_states() {
        let mut history = History::new(HistoryConfig {
            discipline: Discipline::Snapshots,
            ..config(10, 0)
        });
        let mut doc = Document::new();
        history.set_baseline(&doc).unwrap();

        let node = doc.create_node(NodeRecord::new("Item"));
        doc.insert_node(&NodePath::root(0), node).unwrap();
        assert!(history.add_snapshot_step(&doc, "add", 1).unwrap().is_some());
        assert!(history.add_snapshot_step(&doc, "same", 2).unwrap().is_none());

        let report = history.undo(&mut doc).unwrap().unwrap();
        assert!(report.restored_from_snapshot);
        assert!(doc.roots().is_empty());

        history.redo(&mut doc).unwrap();
        assert_eq!(doc.node_at(&NodePath::root(0)), Some(node));

        let err = history.record_operation(Operation::new(
            Edit::NodeCreate {
                node,
                at: NodePath::root(0),
            },
            3,
        ));
        assert!(matches!(err, Err(ArborError::DisciplineMismatch { .. })));
    }
}

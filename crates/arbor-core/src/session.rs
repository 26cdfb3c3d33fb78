//! Edit session
//!
//! One [`EditSession`] owns everything a single document-editing session
//! needs: the document, its schema registry, the tree index, the history and
//! a clock. Every write follows the same path: mutate the document, mark the
//! index dirty (scoped where the change has a location), record the edit.
//! Every read goes through the index after it has been brought up to date.
//!
//! The session is single-threaded by construction (`&mut self` for all
//! mutation); hosts that want background work run read-only preparation such
//! as [`SchemaRegistry::warm`] elsewhere and hand results back.

use std::collections::HashSet;

use crate::clock::{Clock, SystemClock};
use crate::config::{Discipline, SessionConfig};
use crate::core_types::schema::{OP_ADD_STEP, OP_COLLECT_GARBAGE};
use crate::core_types::{SessionId, StepId};
use crate::errors::{ArborError, Result};
use crate::history::{Edit, History, Operation, RecordOutcome, StepReport};
use crate::index::{IndexStats, NodeMetadata, TreeIndex};
use crate::model::{Document, Edge, NodeId, NodeRecord, Value};
use crate::path::NodePath;
use crate::schema::SchemaRegistry;
use crate::{log_op_end, log_op_error, log_op_start};

/// Notification for the view layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A step was pushed onto the undo stack
    StepCommitted { step_id: StepId },
    Undone { report: StepReport },
    Redone { report: StepReport },
    /// A snapshot step was captured by [`EditSession::add_step`]
    SnapshotCaptured { step_id: StepId },
    /// Cached node references and layout must be rebuilt from scratch
    RebuildRequired { reason: String },
}

pub struct EditSession {
    id: SessionId,
    config: SessionConfig,
    document: Document,
    registry: SchemaRegistry,
    index: TreeIndex,
    history: History,
    clock: Box<dyn Clock>,
    events: Vec<SessionEvent>,
    saved_top: Option<StepId>,
    unrecorded_edits: bool,
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("id", &self.id)
            .field("nodes", &self.document.node_count())
            .field("undo_depth", &self.history.undo_depth())
            .field("redo_depth", &self.history.redo_depth())
            .finish_non_exhaustive()
    }
}

impl EditSession {
    /// Start a session on an empty document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate.
    pub fn new(registry: SchemaRegistry, config: SessionConfig) -> Result<Self> {
        Self::with_document(Document::new(), registry, config)
    }

    /// Start a session on an existing document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate, or
    /// `Serialization` if a snapshot baseline cannot be captured.
    pub fn with_document(document: Document, registry: SchemaRegistry, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let mut history = History::new(config.history.clone());
        if config.history.discipline == Discipline::Snapshots {
            history.set_baseline(&document)?;
        }
        let session = Self {
            id: SessionId::new(),
            index: TreeIndex::new(config.index.scoped_rebuild),
            config,
            document,
            registry,
            history,
            clock: Box::new(SystemClock),
            events: Vec::new(),
            saved_top: None,
            unrecorded_edits: false,
        };
        tracing::info!(
            session_id = %session.id,
            discipline = session.config.history.discipline.as_str(),
            "edit session started"
        );
        Ok(session)
    }

    /// Replace the clock (deterministic tests, replay hosts)
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access for collaborators that edit the document directly
    ///
    /// The whole index is invalidated. Edits made this way must be reported
    /// through [`EditSession::record_operation`] (or captured with
    /// [`EditSession::add_step`]) to become undoable.
    pub fn document_mut(&mut self) -> &mut Document {
        self.index.mark_dirty();
        self.unrecorded_edits = true;
        &mut self.document
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_millis()
    }

    // ===== Recording =====

    /// Snapshot sessions record nothing per edit; the host captures steps
    /// with [`EditSession::add_step`]
    fn record(&mut self, edit: Edit) -> Result<()> {
        if self.history.discipline() == Discipline::Snapshots {
            self.unrecorded_edits = true;
            return Ok(());
        }
        let op = Operation::new(edit, self.now_ms());
        self.history.record_operation(op)?;
        self.sync_committed();
        Ok(())
    }

    /// Record an operation a collaborator has already applied
    ///
    /// # Errors
    ///
    /// Returns `DisciplineMismatch` for a snapshot-discipline session.
    pub fn record_operation(&mut self, op: Operation) -> Result<RecordOutcome> {
        let outcome = self.history.record_operation(op)?;
        self.unrecorded_edits = false;
        self.sync_committed();
        Ok(outcome)
    }

    fn sync_committed(&mut self) {
        self.events.extend(
            self.history
                .drain_committed()
                .into_iter()
                .map(|step_id| SessionEvent::StepCommitted { step_id }),
        );
    }

    // ===== Edits =====

    /// Create a node and append it to the root collection
    ///
    /// # Errors
    ///
    /// Propagates document and history errors.
    pub fn add_root(&mut self, record: NodeRecord) -> Result<NodeId> {
        let node = self.document.create_node(record);
        let at = NodePath::root(self.document.roots().len());
        self.insert_node(&at, node)?;
        Ok(node)
    }

    /// Create a detached node; it joins the history once inserted
    pub fn create_node(&mut self, record: NodeRecord) -> NodeId {
        self.document.create_node(record)
    }

    /// Attach a detached node at `at`
    ///
    /// # Errors
    ///
    /// Propagates document errors (`InsertTargetOccupied`, `IndexOutOfRange`,
    /// `SlotMismatch`, path and handle errors).
    pub fn insert_node(&mut self, at: &NodePath, node: NodeId) -> Result<()> {
        self.document.insert_node(at, node)?;
        self.index.mark_path_dirty(at.clone());
        tracing::debug!(node_id = %node, path = %at, "node inserted");
        self.record(Edit::NodeCreate {
            node,
            at: at.clone(),
        })
    }

    /// Detach the node at `at` together with every edge touching its subtree
    ///
    /// Edge removals and the detach undo as one step. The node stays alive
    /// until [`EditSession::collect_garbage`] reclaims it.
    ///
    /// # Errors
    ///
    /// Returns `PathUnresolved` if no node is at `at`, or propagates document
    /// errors.
    pub fn delete_node(&mut self, at: &NodePath) -> Result<NodeId> {
        let node = self.document.node_at(at).ok_or_else(|| ArborError::PathUnresolved {
            path: at.to_string(),
            reason: "no node at path".to_string(),
        })?;

        let subtree = self.subtree(node);
        let edges: Vec<Edge> = self
            .document
            .edges()
            .filter(|e| subtree.contains(&e.from.node) || subtree.contains(&e.to.node))
            .cloned()
            .collect();

        let own_batch = !edges.is_empty()
            && self.history.discipline() == Discipline::Operations
            && !self.history.is_batch_open();
        if own_batch {
            let now = self.now_ms();
            self.history.begin_batch(format!("delete {}", node), now)?;
        }

        let result = self.delete_with_edges(at, node, edges);

        if own_batch {
            self.history.end_batch();
            self.sync_committed();
        }
        result
    }

    fn delete_with_edges(&mut self, at: &NodePath, node: NodeId, edges: Vec<Edge>) -> Result<NodeId> {
        for edge in edges {
            self.document.remove_edge(&edge);
            self.record(Edit::EdgeRemove { edge })?;
        }
        let removed = self.document.detach_node(at)?;
        self.index.mark_path_dirty(at.clone());
        tracing::debug!(node_id = %removed, path = %at, "node deleted");
        self.record(Edit::NodeDelete { node, at: at.clone() })?;
        Ok(removed)
    }

    /// Nodes in the indexed subtree of `node`, itself included
    fn subtree(&mut self, node: NodeId) -> HashSet<NodeId> {
        let index = self.index.ensure_clean(&self.document, &self.registry);
        let mut nodes = HashSet::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if nodes.insert(id) {
                stack.extend_from_slice(index.children(id));
            }
        }
        nodes
    }

    /// Move the node at `from` to `to` (`to` as seen after the detach)
    ///
    /// A failed insert puts the node back at `from`.
    ///
    /// # Errors
    ///
    /// Propagates document errors. A failed insert returns the insert error
    /// even if putting the node back fails too.
    pub fn move_node(&mut self, from: &NodePath, to: &NodePath) -> Result<NodeId> {
        let node = self.document.detach_node(from)?;
        if let Err(e) = self.document.insert_node(to, node) {
            return Err(self.undo_detach(from, node, e));
        }
        self.index.mark_path_dirty(from.clone());
        self.index.mark_path_dirty(to.clone());
        tracing::debug!(node_id = %node, from = %from, to = %to, "node moved");
        self.record(Edit::NodeMove {
            node,
            from: from.clone(),
            to: to.clone(),
        })?;
        Ok(node)
    }

    /// Re-attach a node whose move failed; returns `cause`
    ///
    /// If the node cannot go back it stays detached, unrecorded, and the
    /// session reports itself modified.
    fn undo_detach(&mut self, from: &NodePath, node: NodeId, cause: ArborError) -> ArborError {
        if let Err(rollback) = self.document.insert_node(from, node) {
            tracing::error!(
                node_id = %node,
                from = %from,
                cause = %cause,
                error = %rollback,
                "move rollback failed, node left detached"
            );
            self.index.mark_path_dirty(from.clone());
            self.unrecorded_edits = true;
        }
        cause
    }

    /// Write a member of a node; returns the previous value
    ///
    /// Only members that are declared child slots, or whose old or new value
    /// holds node references, invalidate the index.
    ///
    /// # Errors
    ///
    /// Propagates document errors.
    pub fn set_member(&mut self, node: NodeId, member: &NodePath, value: Value) -> Result<Value> {
        let old = self.document.set_member(node, member, value.clone())?;
        if self.is_structural(node, member, &old, &value) {
            self.index.mark_node_dirty(node);
        }
        self.record(Edit::FieldModify {
            node,
            member: member.clone(),
            old: old.clone(),
            new: value,
        })?;
        Ok(old)
    }

    fn is_structural(&self, node: NodeId, member: &NodePath, old: &Value, new: &Value) -> bool {
        let mut refs = Vec::new();
        old.collect_nodes(&mut refs);
        new.collect_nodes(&mut refs);
        if !refs.is_empty() {
            return true;
        }
        let Some(name) = member.parts().first().and_then(|p| p.as_field()) else {
            return false;
        };
        self.document
            .node(node)
            .map(|record| {
                self.registry
                    .resolve(&record.type_name)
                    .slots
                    .iter()
                    .any(|slot| slot.name == name)
            })
            .unwrap_or(false)
    }

    /// Add an edge; returns false if it already existed
    ///
    /// # Errors
    ///
    /// Returns handle errors if either endpoint is not alive.
    pub fn connect(&mut self, edge: Edge) -> Result<bool> {
        self.document.node(edge.from.node)?;
        self.document.node(edge.to.node)?;
        if !self.document.add_edge(edge.clone()) {
            return Ok(false);
        }
        self.record(Edit::EdgeCreate { edge })?;
        Ok(true)
    }

    /// Remove an edge
    ///
    /// # Errors
    ///
    /// Returns `EdgeNotFound` if the edge does not exist.
    pub fn disconnect(&mut self, edge: &Edge) -> Result<()> {
        if !self.document.remove_edge(edge) {
            return Err(ArborError::EdgeNotFound {
                edge: edge.to_string(),
            });
        }
        self.record(Edit::EdgeRemove { edge: edge.clone() })
    }

    // ===== Steps =====

    /// Open a batch; everything recorded until [`EditSession::end_batch`]
    /// undoes as one step
    ///
    /// # Errors
    ///
    /// Returns `DisciplineMismatch` for a snapshot-discipline session.
    pub fn begin_batch(&mut self, description: impl Into<String>) -> Result<()> {
        let now = self.now_ms();
        self.history.begin_batch(description, now)?;
        self.sync_committed();
        Ok(())
    }

    pub fn end_batch(&mut self) -> Option<StepId> {
        let id = self.history.end_batch();
        self.sync_committed();
        id
    }

    /// Commit merge groups whose window has elapsed
    pub fn poll(&mut self) -> usize {
        let now = self.now_ms();
        let count = self.history.poll(now);
        self.sync_committed();
        count
    }

    /// Undo the most recent step; false when there is nothing to undo
    ///
    /// The index is invalidated either way. On failure the document is left as
    /// it was and a `RebuildRequired` event tells the view to redraw from
    /// scratch.
    ///
    /// # Errors
    ///
    /// Propagates replay and snapshot restore errors.
    pub fn undo(&mut self) -> Result<bool> {
        let result = self.history.undo(&mut self.document);
        self.sync_committed();
        self.after_replay(result, |report| SessionEvent::Undone { report })
    }

    /// Redo the most recently undone step; false when there is nothing to redo
    ///
    /// # Errors
    ///
    /// Same as [`EditSession::undo`].
    pub fn redo(&mut self) -> Result<bool> {
        let result = self.history.redo(&mut self.document);
        self.sync_committed();
        self.after_replay(result, |report| SessionEvent::Redone { report })
    }

    fn after_replay(
        &mut self,
        result: Result<Option<StepReport>>,
        event: impl FnOnce(StepReport) -> SessionEvent,
    ) -> Result<bool> {
        match result {
            Ok(Some(report)) => {
                self.index.mark_dirty();
                if report.restored_from_snapshot {
                    self.events.push(SessionEvent::RebuildRequired {
                        reason: "document restored from snapshot".to_string(),
                    });
                }
                self.events.push(event(report));
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.index.mark_dirty();
                self.events.push(SessionEvent::RebuildRequired {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Capture a whole-document snapshot step
    ///
    /// Returns `None` when nothing changed since the last capture.
    ///
    /// # Errors
    ///
    /// Returns `DisciplineMismatch` for an operation-discipline session, or
    /// `Serialization` if the document cannot be encoded.
    pub fn add_step(&mut self, description: &str, mark_dirty: bool) -> Result<Option<StepId>> {
        let start = std::time::Instant::now();
        log_op_start!(OP_ADD_STEP, session_id = %self.id);

        let now = self.now_ms();
        let captured = match self.history.add_snapshot_step(&self.document, description, now) {
            Ok(captured) => captured,
            Err(e) => {
                log_op_error!(OP_ADD_STEP, e.clone(), started = start);
                return Err(e);
            }
        };
        // drained here so the snapshot is reported once, as SnapshotCaptured
        self.history.drain_committed();
        self.unrecorded_edits = false;
        if mark_dirty {
            self.index.mark_dirty();
        }
        if let Some(step_id) = &captured {
            self.events.push(SessionEvent::SnapshotCaptured {
                step_id: step_id.clone(),
            });
        }

        log_op_end!(
            OP_ADD_STEP,
            started = start,
            captured = captured.is_some()
        );
        Ok(captured)
    }

    /// Free detached nodes no recorded step can bring back; returns how many
    pub fn collect_garbage(&mut self) -> usize {
        let start = std::time::Instant::now();
        log_op_start!(OP_COLLECT_GARBAGE, session_id = %self.id);

        let retained = self.history.referenced_nodes();
        let freed = self.document.purge_unreachable(&retained);

        log_op_end!(
            OP_COLLECT_GARBAGE,
            started = start,
            freed = freed,
            retained = retained.len()
        );
        freed
    }

    // ===== Queries =====

    /// The index, rebuilt first if dirty
    pub fn index(&mut self) -> &TreeIndex {
        self.index.ensure_clean(&self.document, &self.registry)
    }

    pub fn sorted_nodes(&mut self) -> &[NodeId] {
        self.index().sorted_nodes()
    }

    pub fn metadata(&mut self, node: NodeId) -> Option<&NodeMetadata> {
        self.index().metadata(node)
    }

    pub fn children(&mut self, node: NodeId) -> &[NodeId] {
        self.index().children(node)
    }

    pub fn parent(&mut self, node: NodeId) -> Option<NodeId> {
        self.index().parent(node)
    }

    pub fn node_by_path(&mut self, path: &NodePath) -> Option<NodeId> {
        self.index().node_by_path(path)
    }

    /// Diagnostic text describing cycles, orphans and broken links
    pub fn validate_tree(&mut self) -> String {
        self.index.ensure_clean(&self.document, &self.registry);
        self.index.validate(&self.document)
    }

    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // ===== Save tracking =====

    /// The document differs from the state last marked saved
    pub fn is_modified(&self) -> bool {
        self.unrecorded_edits
            || self.history.pending_len() > 0
            || self.history.top_step_id() != self.saved_top.as_ref()
    }

    pub fn mark_saved(&mut self) {
        self.history.flush_pending();
        self.sync_committed();
        self.saved_top = self.history.top_step_id().cloned();
        self.unrecorded_edits = false;
    }
}

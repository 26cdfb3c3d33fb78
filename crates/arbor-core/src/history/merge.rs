//! Coalescing of rapid field modifications
//!
//! Field modifications on the same `(node, member)` pair are held in a group
//! until no further edit arrives for the merge window. A flushed group
//! collapses to one modification from the earliest old value to the latest
//! new value, ordered by timestamp. A group whose collapsed old and new values
//! are equal vanishes, however many intermediate values it passed through.

use super::operation::{Edit, Operation};
use crate::model::{NodeId, Value};
use crate::path::NodePath;

#[derive(Debug, Clone)]
struct MergeGroup {
    node: NodeId,
    member: NodePath,
    earliest: (u64, Value),
    latest: (u64, Value),
    deadline_ms: u64,
    merged: usize,
}

impl MergeGroup {
    fn collapse(self) -> Option<Operation> {
        let (_, old) = self.earliest;
        let (timestamp_ms, new) = self.latest;
        if old == new {
            tracing::debug!(
                node_id = %self.node,
                member = %self.member,
                merged = self.merged,
                "merge group cancelled out"
            );
            return None;
        }
        if self.merged > 1 {
            tracing::debug!(
                node_id = %self.node,
                member = %self.member,
                merged = self.merged,
                "field modifications merged"
            );
        }
        Some(Operation::new(
            Edit::FieldModify {
                node: self.node,
                member: self.member,
                old,
                new,
            },
            timestamp_ms,
        ))
    }
}

/// Pending merge groups in arrival order
#[derive(Debug, Clone, Default)]
pub(crate) struct MergeQueue {
    window_ms: u64,
    groups: Vec<MergeGroup>,
}

impl MergeQueue {
    pub(crate) fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            groups: Vec::new(),
        }
    }

    /// Queue a field modification
    ///
    /// Returns the operation back if it is not a field modification.
    pub(crate) fn push(&mut self, op: Operation) -> Result<(), Operation> {
        let Edit::FieldModify {
            node,
            member,
            old,
            new,
        } = op.edit
        else {
            return Err(op);
        };
        let ts = op.timestamp_ms;
        let deadline_ms = ts.saturating_add(self.window_ms);

        match self
            .groups
            .iter_mut()
            .find(|g| g.node == node && g.member == member)
        {
            Some(group) => {
                // strictly earlier replaces, ties keep arrival order
                if ts < group.earliest.0 {
                    group.earliest = (ts, old);
                }
                if ts >= group.latest.0 {
                    group.latest = (ts, new);
                }
                group.deadline_ms = group.deadline_ms.max(deadline_ms);
                group.merged += 1;
            }
            None => self.groups.push(MergeGroup {
                node,
                member,
                earliest: (ts, old),
                latest: (ts, new),
                deadline_ms,
                merged: 1,
            }),
        }
        Ok(())
    }

    /// Collapse and remove every group whose window has elapsed at `now_ms`
    pub(crate) fn take_due(&mut self, now_ms: u64) -> Vec<Operation> {
        let (due, waiting): (Vec<MergeGroup>, Vec<MergeGroup>) = std::mem::take(&mut self.groups)
            .into_iter()
            .partition(|g| g.deadline_ms <= now_ms);
        self.groups = waiting;
        due.into_iter().filter_map(MergeGroup::collapse).collect()
    }

    /// Collapse and remove every group
    pub(crate) fn take_all(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.groups)
            .into_iter()
            .filter_map(MergeGroup::collapse)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
    }

    /// Nodes referenced by pending groups
    pub(crate) fn referenced_nodes(&self, out: &mut Vec<NodeId>) {
        for group in &self.groups {
            out.push(group.node);
            group.earliest.1.collect_nodes(out);
            group.latest.1.collect_nodes(out);
        }
    }
}

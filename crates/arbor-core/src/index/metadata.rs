use crate::model::NodeId;
use crate::path::NodePath;
use crate::traversal::Visit;

/// Derived index entry for one reachable node
///
/// Produced and discarded by index rebuilds only; never edited by callers and
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetadata {
    pub node: NodeId,
    pub parent: Option<NodeId>,
    pub path: NodePath,
    /// Roots are depth 0
    pub depth: usize,
    pub root_index: usize,
    /// Slot the parent holds this node in; `None` for roots
    pub slot: Option<String>,
    pub priority: i32,
    pub slot_ordinal: usize,
    pub list_index: Option<usize>,
    /// Position in [`TreeIndex::sorted_nodes`](super::TreeIndex::sorted_nodes)
    pub render_order: usize,
    /// Children in sibling order
    pub children: Vec<NodeId>,
}

impl NodeMetadata {
    pub(crate) fn from_visit(visit: Visit) -> Self {
        let (slot, priority, slot_ordinal, list_index) = match visit.entry {
            Some(entry) => (
                Some(entry.slot),
                entry.priority,
                entry.slot_ordinal,
                entry.list_index,
            ),
            None => (None, 0, 0, Some(visit.root_index)),
        };
        Self {
            node: visit.node,
            parent: visit.parent,
            path: visit.path,
            depth: visit.depth,
            root_index: visit.root_index,
            slot,
            priority,
            slot_ordinal,
            list_index,
            render_order: 0,
            children: Vec::new(),
        }
    }

    /// Sibling ordering key: priority, declaration order, list position
    pub fn sibling_key(&self) -> (i32, usize, usize) {
        (self.priority, self.slot_ordinal, self.list_index.unwrap_or(0))
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none() && self.depth == 0
    }
}

//! Tree index
//!
//! A derived, rebuildable cache of parent/child/order relationships over the
//! node graph. Every mutation marks the index dirty; every read goes through
//! [`TreeIndex::ensure_clean`], which rebuilds before answering.
//!
//! ## Rebuilds
//!
//! - **Full**: walk every root, key each node by path, resolve parents by
//!   path prefix, sort siblings, number the render order.
//! - **Scoped**: for each changed path, find the deepest node above it that
//!   is still the same node at the same path, drop the cached entries below
//!   it and re-walk only that subtree. Removing list element `i` changes the
//!   path of every later sibling, so the anchor is always a node above the
//!   list and the whole list is re-derived.
//!
//! A changed root collection or an anchor that cannot be confirmed falls back
//! to a full rebuild.

mod metadata;
mod rebuild;
mod validate;

pub use metadata::NodeMetadata;

use std::collections::HashMap;

use crate::model::NodeId;
use crate::path::NodePath;
use crate::traversal::{CycleReport, FailureReport, SharedReport};

/// Clean/dirty state of the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Clean,
    Dirty,
}

/// Pending invalidation
#[derive(Debug, Clone, PartialEq)]
enum Invalidation {
    None,
    Scoped(Vec<NodePath>),
    Full,
}

/// Rebuild counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub full_rebuilds: u64,
    pub scoped_rebuilds: u64,
}

/// Structural findings of the most recent rebuild
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub cycles: Vec<CycleReport>,
    pub shared: Vec<SharedReport>,
    pub failures: Vec<FailureReport>,
}

impl Diagnostics {
    /// Drop findings located at or below `anchor`
    fn retain_outside(&mut self, anchor: &NodePath) {
        self.cycles.retain(|c| !c.path.starts_with(anchor));
        self.shared.retain(|s| !s.other_path.starts_with(anchor));
        self.failures.retain(|f| !f.path.starts_with(anchor));
    }
}

/// Derived hierarchy index
#[derive(Debug, Clone)]
pub struct TreeIndex {
    scoped_enabled: bool,
    invalidation: Invalidation,
    entries: HashMap<NodeId, NodeMetadata>,
    by_path: HashMap<NodePath, NodeId>,
    roots: Vec<NodeId>,
    sorted: Vec<NodeId>,
    diagnostics: Diagnostics,
    stats: IndexStats,
}

impl Default for TreeIndex {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TreeIndex {
    /// Create an empty index; it starts dirty
    pub fn new(scoped_rebuild: bool) -> Self {
        Self {
            scoped_enabled: scoped_rebuild,
            invalidation: Invalidation::Full,
            entries: HashMap::new(),
            by_path: HashMap::new(),
            roots: Vec::new(),
            sorted: Vec::new(),
            diagnostics: Diagnostics::default(),
            stats: IndexStats::default(),
        }
    }

    pub fn state(&self) -> IndexState {
        match self.invalidation {
            Invalidation::None => IndexState::Clean,
            _ => IndexState::Dirty,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.state() == IndexState::Clean
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    // ===== Invalidation =====

    /// Invalidate everything
    pub fn mark_dirty(&mut self) {
        self.invalidation = Invalidation::Full;
    }

    /// Invalidate the structure at or below `path`
    ///
    /// `path` is the location that changed: an inserted or removed element,
    /// or a node whose members changed.
    pub fn mark_path_dirty(&mut self, path: NodePath) {
        if !self.scoped_enabled || path.is_empty() {
            self.invalidation = Invalidation::Full;
            return;
        }
        match &mut self.invalidation {
            Invalidation::Full => {}
            Invalidation::Scoped(paths) => paths.push(path),
            Invalidation::None => self.invalidation = Invalidation::Scoped(vec![path]),
        }
    }

    /// Invalidate the structure below an indexed node
    ///
    /// A node the index does not know is detached; changes to it cannot
    /// affect the index until it is attached, which marks its own path.
    pub fn mark_node_dirty(&mut self, node: NodeId) {
        if let Some(path) = self.entries.get(&node).map(|m| m.path.clone()) {
            self.mark_path_dirty(path);
        }
    }

    // ===== Queries =====
    //
    // These answer from the last rebuild. Callers go through `ensure_clean`
    // first.

    pub fn metadata(&self, node: NodeId) -> Option<&NodeMetadata> {
        self.entries.get(&node)
    }

    /// Children in sibling order; empty for leaves and unknown nodes
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.entries
            .get(&node)
            .map(|m| m.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.entries.get(&node).and_then(|m| m.parent)
    }

    pub fn node_by_path(&self, path: &NodePath) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    /// Every indexed node ordered by root index, depth, then sibling order
    pub fn sorted_nodes(&self) -> &[NodeId] {
        &self.sorted
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Every indexed node with its metadata, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &NodeMetadata> + '_ {
        self.entries.values()
    }
}

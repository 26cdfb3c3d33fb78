use std::collections::{HashMap, HashSet, VecDeque};

use super::{Diagnostics, Invalidation, NodeMetadata, TreeIndex};
use crate::core_types::schema::{OP_INDEX_REBUILD, SCOPE_FULL, SCOPE_SCOPED};
use crate::model::{Document, NodeId};
use crate::path::NodePath;
use crate::schema::SchemaRegistry;
use crate::traversal::{walk_forest, walk_subtree, Visit, Walk};
use crate::{log_op_end, log_op_start};

impl TreeIndex {
    /// Bring the index up to date with the document
    ///
    /// Runs a scoped rebuild when only scoped invalidations are pending and a
    /// full rebuild otherwise. Rebuilds never fail: member access failures
    /// are recorded in [`TreeIndex::diagnostics`] and the member skipped.
    pub fn ensure_clean(&mut self, doc: &Document, registry: &SchemaRegistry) -> &TreeIndex {
        match std::mem::replace(&mut self.invalidation, Invalidation::None) {
            Invalidation::None => {}
            Invalidation::Full => self.rebuild_full(doc, registry),
            Invalidation::Scoped(paths) => {
                if !self.rebuild_scoped(doc, registry, &paths) {
                    self.rebuild_full(doc, registry);
                }
            }
        }
        self
    }

    fn rebuild_full(&mut self, doc: &Document, registry: &SchemaRegistry) {
        let start = std::time::Instant::now();
        log_op_start!(OP_INDEX_REBUILD, scope = SCOPE_FULL);

        let Walk {
            visits,
            cycles,
            shared,
            failures,
        } = walk_forest(doc, registry);

        self.entries.clear();
        self.by_path.clear();
        let mut nodes = Vec::with_capacity(visits.len());
        for visit in visits {
            nodes.push(visit.node);
            self.by_path.insert(visit.path.clone(), visit.node);
            self.entries.insert(visit.node, NodeMetadata::from_visit(visit));
        }
        self.link(&nodes);
        self.diagnostics = Diagnostics {
            cycles,
            shared,
            failures,
        };
        self.recompute_order(doc);
        self.stats.full_rebuilds += 1;

        log_op_end!(
            OP_INDEX_REBUILD,
            started = start,
            scope = SCOPE_FULL,
            node_count = self.entries.len()
        );
    }

    /// Returns false when the change cannot be scoped; the caller then runs a
    /// full rebuild.
    fn rebuild_scoped(&mut self, doc: &Document, registry: &SchemaRegistry, changed: &[NodePath]) -> bool {
        let start = std::time::Instant::now();

        let mut anchors: Vec<(NodeId, NodePath)> = Vec::with_capacity(changed.len());
        for path in changed {
            match self.find_anchor(doc, path) {
                Some(anchor) => anchors.push(anchor),
                None => {
                    tracing::debug!(path = %path, "no stable anchor, falling back to full rebuild");
                    return false;
                }
            }
        }
        anchors.sort_by_key(|(_, path)| path.depth());
        let mut scopes: Vec<(NodeId, NodePath)> = Vec::new();
        for (node, path) in anchors {
            if !scopes.iter().any(|(_, kept)| path.starts_with(kept)) {
                scopes.push((node, path));
            }
        }

        log_op_start!(OP_INDEX_REBUILD, scope = SCOPE_SCOPED, anchor_count = scopes.len());

        // Phase 1: drop everything cached below the anchors
        for (_, anchor_path) in &scopes {
            let doomed: Vec<NodeId> = self
                .entries
                .values()
                .filter(|m| m.path.is_child_of(anchor_path))
                .map(|m| m.node)
                .collect();
            for id in doomed {
                if let Some(meta) = self.entries.remove(&id) {
                    self.by_path.remove(&meta.path);
                }
            }
            self.diagnostics.retain_outside(anchor_path);
        }

        // Phase 2: re-walk each anchor subtree against the remaining entries
        let mut seen: HashMap<NodeId, NodePath> = self
            .entries
            .values()
            .map(|m| (m.node, m.path.clone()))
            .collect();
        let mut fresh = Vec::new();
        for (anchor, anchor_path) in &scopes {
            let Some(meta) = self.entries.get_mut(anchor) else {
                return false;
            };
            meta.children.clear();
            let seed = Visit {
                node: *anchor,
                path: anchor_path.clone(),
                parent: meta.parent,
                depth: meta.depth,
                root_index: meta.root_index,
                entry: None,
            };
            let chain = self.ancestor_chain(*anchor);
            seen.remove(anchor);

            let mut walk = Walk::default();
            walk_subtree(doc, registry, seed, &chain, &mut seen, &mut walk);
            for visit in walk.visits {
                if visit.node == *anchor {
                    continue;
                }
                fresh.push(visit.node);
                self.by_path.insert(visit.path.clone(), visit.node);
                self.entries.insert(visit.node, NodeMetadata::from_visit(visit));
            }
            self.diagnostics.cycles.extend(walk.cycles);
            self.diagnostics.shared.extend(walk.shared);
            self.diagnostics.failures.extend(walk.failures);
        }

        self.link(&fresh);
        self.recompute_order(doc);
        self.stats.scoped_rebuilds += 1;

        log_op_end!(
            OP_INDEX_REBUILD,
            started = start,
            scope = SCOPE_SCOPED,
            node_count = fresh.len()
        );
        true
    }

    /// Deepest node above (or at) `path` that the document still holds at the
    /// same path as the index does
    fn find_anchor(&self, doc: &Document, path: &NodePath) -> Option<(NodeId, NodePath)> {
        std::iter::once(path.clone())
            .chain(path.ancestors())
            .take_while(|prefix| !prefix.is_empty())
            .find_map(|prefix| {
                let cached = self.by_path.get(&prefix).copied()?;
                (doc.node_at(&prefix) == Some(cached)).then_some((cached, prefix))
            })
    }

    /// Ancestors of an indexed node, root first
    fn ancestor_chain(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = self.parent(node);
        while let Some(id) = cursor {
            if chain.contains(&id) {
                break;
            }
            chain.push(id);
            cursor = self.parent(id);
        }
        chain.reverse();
        chain
    }

    /// Nearest indexed node on a proper prefix of `path`
    fn resolve_parent(&self, path: &NodePath) -> Option<NodeId> {
        path.ancestors()
            .take_while(|prefix| !prefix.is_empty())
            .find_map(|prefix| self.by_path.get(&prefix).copied())
    }

    /// Resolve parents of `nodes` by path and append them to their parents'
    /// children, then restore sibling order on every touched parent
    fn link(&mut self, nodes: &[NodeId]) {
        let links: Vec<(NodeId, Option<NodeId>)> = nodes
            .iter()
            .filter_map(|id| {
                self.entries
                    .get(id)
                    .map(|meta| (*id, self.resolve_parent(&meta.path)))
            })
            .collect();

        let mut touched = HashSet::new();
        for (id, parent) in links {
            if let Some(meta) = self.entries.get_mut(&id) {
                meta.parent = parent;
            }
            if let Some(parent_meta) = parent.and_then(|p| self.entries.get_mut(&p)) {
                parent_meta.children.push(id);
                touched.insert(parent_meta.node);
            }
        }

        for parent in touched {
            let Some(mut children) = self
                .entries
                .get_mut(&parent)
                .map(|m| std::mem::take(&mut m.children))
            else {
                continue;
            };
            children.sort_by_key(|c| self.entries.get(c).map(NodeMetadata::sibling_key));
            if let Some(meta) = self.entries.get_mut(&parent) {
                meta.children = children;
            }
        }
    }

    /// Recompute roots, depths and render order
    ///
    /// Nodes are ordered by root index, depth, slot priority and list index.
    /// Ties keep breadth-first position, so siblings stay in sibling order.
    fn recompute_order(&mut self, doc: &Document) {
        self.roots = doc
            .roots()
            .iter()
            .enumerate()
            .filter(|(i, id)| {
                self.entries
                    .get(*id)
                    .is_some_and(|m| m.path == NodePath::root(*i))
            })
            .map(|(_, id)| *id)
            .collect();

        self.sorted.clear();
        let mut queue = VecDeque::new();
        for root in self.roots.clone() {
            queue.push_back((root, 0usize));
            while let Some((node, depth)) = queue.pop_front() {
                let Some(meta) = self.entries.get_mut(&node) else {
                    continue;
                };
                meta.depth = depth;
                queue.extend(meta.children.iter().map(|c| (*c, depth + 1)));
                self.sorted.push(node);
            }
        }

        let entries = &self.entries;
        self.sorted.sort_by_key(|id| {
            entries.get(id).map(|m| {
                (m.root_index, m.depth, m.priority, m.list_index.unwrap_or(0))
            })
        });
        for (render_order, id) in self.sorted.iter().enumerate() {
            if let Some(meta) = self.entries.get_mut(id) {
                meta.render_order = render_order;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeRecord, Value};
    use crate::schema::TypeDescriptor;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                TypeDescriptor::new("Group")
                    .collection("Items", 1)
                    .single("Header", 0),
            )
            .unwrap();
        registry
    }

    fn sample() -> (Document, NodeId, Vec<NodeId>) {
        let mut doc = Document::new();
        let items: Vec<NodeId> = (0..3).map(|_| doc.create_node(NodeRecord::new("Item"))).collect();
        let root = doc.create_node(NodeRecord::new("Group").with("Items", Value::nodes(items.clone())));
        doc.insert_node(&NodePath::root(0), root).unwrap();
        (doc, root, items)
    }

    #[test]
    fn test_full_rebuild_links_and_orders() {
        let (mut doc, root, items) = sample();
        let header = doc.create_node(NodeRecord::new("Item"));
        doc.insert_node(&NodePath::root(0).field("Header"), header).unwrap();

        let mut index = TreeIndex::new(true);
        index.ensure_clean(&doc, &registry());

        assert_eq!(index.children(root), &[header, items[0], items[1], items[2]]);
        assert_eq!(index.parent(items[1]), Some(root));
        assert_eq!(index.metadata(items[2]).unwrap().depth, 1);
        assert_eq!(index.sorted_nodes()[0], root);
        assert_eq!(index.metadata(header).unwrap().render_order, 1);
        assert_eq!(index.stats().full_rebuilds, 1);
    }

    #[test]
    fn test_scoped_rebuild_rederives_shifted_siblings() {
        let (mut doc, root, items) = sample();
        let registry = registry();
        let mut index = TreeIndex::new(true);
        index.ensure_clean(&doc, &registry);

        let removed = NodePath::root(0).field("Items").index(0);
        doc.detach_node(&removed).unwrap();
        index.mark_path_dirty(removed);
        index.ensure_clean(&doc, &registry);

        assert_eq!(index.stats().scoped_rebuilds, 1);
        assert!(!index.contains(items[0]));
        assert_eq!(index.metadata(items[1]).unwrap().path.to_string(), "[0].Items[0]");
        assert_eq!(index.metadata(items[2]).unwrap().list_index, Some(1));
        assert_eq!(index.node_by_path(&NodePath::parse("[0].Items[1]").unwrap()), Some(items[2]));
        assert_eq!(index.node_by_path(&NodePath::parse("[0].Items[2]").unwrap()), None);
        assert_eq!(index.children(root), &[items[1], items[2]]);
    }

    #[test]
    fn test_root_change_falls_back_to_full() {
        let (mut doc, _, _) = sample();
        let registry = registry();
        let mut index = TreeIndex::new(true);
        index.ensure_clean(&doc, &registry);

        doc.detach_node(&NodePath::root(0)).unwrap();
        index.mark_path_dirty(NodePath::root(0));
        index.ensure_clean(&doc, &registry);

        assert_eq!(index.stats().full_rebuilds, 2);
        assert!(index.is_empty());
    }

    #[test]
    fn test_mark_node_dirty_ignores_detached_node() {
        let (mut doc, _, _) = sample();
        let loose = doc.create_node(NodeRecord::new("Item"));
        let mut index = TreeIndex::new(true);
        index.ensure_clean(&doc, &registry());

        index.mark_node_dirty(loose);
        assert!(index.is_clean());
    }
}

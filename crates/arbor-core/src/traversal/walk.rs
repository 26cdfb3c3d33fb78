use std::collections::HashMap;

use super::children::{scan_children, AccessFailure, ChildEntry};
use crate::model::{Document, NodeId};
use crate::path::NodePath;
use crate::schema::SchemaRegistry;

/// One node reached by a walk
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub node: NodeId,
    pub path: NodePath,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub root_index: usize,
    /// How the parent reaches this node; `None` for the walk's seed
    pub entry: Option<ChildEntry>,
}

impl Visit {
    pub(crate) fn root(node: NodeId, root_index: usize) -> Self {
        Self {
            node,
            path: NodePath::root(root_index),
            parent: None,
            depth: 0,
            root_index,
            entry: None,
        }
    }
}

/// A child reference back to one of its own ancestors
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub node: NodeId,
    /// Where the back reference was met
    pub path: NodePath,
    /// Where the node was first visited
    pub ancestor_path: NodePath,
}

/// A node reachable through more than one path
#[derive(Debug, Clone, PartialEq)]
pub struct SharedReport {
    pub node: NodeId,
    pub first_path: NodePath,
    pub other_path: NodePath,
}

/// An access failure together with the path of the node it occurred on
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    pub path: NodePath,
    pub failure: AccessFailure,
}

/// Everything a walk found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Walk {
    /// Visits in depth-first pre-order
    pub visits: Vec<Visit>,
    pub cycles: Vec<CycleReport>,
    pub shared: Vec<SharedReport>,
    pub failures: Vec<FailureReport>,
}

impl Walk {
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.shared.is_empty() && self.failures.is_empty()
    }
}

/// Walk every root of the document
///
/// Iterative depth-first pre-order with a visited set, so it terminates on
/// any graph. The first path a node is reached by wins; later references are
/// reported as cycles (the target is an ancestor) or shared references.
pub fn walk_forest(doc: &Document, registry: &SchemaRegistry) -> Walk {
    let mut walk = Walk::default();
    let mut seen = HashMap::new();
    for (i, root) in doc.roots().iter().enumerate() {
        walk_subtree(doc, registry, Visit::root(*root, i), &[], &mut seen, &mut walk);
    }
    walk
}

/// Walk the subtree below `seed`
///
/// `chain` holds the seed's ancestors from its root down, `seen` the nodes
/// (with their paths) already claimed by earlier walks.
pub(crate) fn walk_subtree(
    doc: &Document,
    registry: &SchemaRegistry,
    seed: Visit,
    chain: &[NodeId],
    seen: &mut HashMap<NodeId, NodePath>,
    walk: &mut Walk,
) {
    let base_depth = seed.depth;
    let mut ancestors: Vec<NodeId> = chain.to_vec();
    let mut stack = vec![seed];

    while let Some(visit) = stack.pop() {
        ancestors.truncate(chain.len() + (visit.depth - base_depth));

        if ancestors.contains(&visit.node) {
            walk.cycles.push(CycleReport {
                node: visit.node,
                ancestor_path: seen.get(&visit.node).cloned().unwrap_or_default(),
                path: visit.path,
            });
            continue;
        }
        if let Some(first) = seen.get(&visit.node) {
            walk.shared.push(SharedReport {
                node: visit.node,
                first_path: first.clone(),
                other_path: visit.path,
            });
            continue;
        }

        let scan = match scan_children(doc, registry, visit.node) {
            Ok(scan) => scan,
            Err(e) => {
                walk.failures.push(FailureReport {
                    path: visit.path.clone(),
                    failure: AccessFailure {
                        node: visit.node,
                        member: NodePath::empty(),
                        reason: e.to_string(),
                    },
                });
                continue;
            }
        };

        seen.insert(visit.node, visit.path.clone());
        walk.failures
            .extend(scan.failures.into_iter().map(|failure| FailureReport {
                path: visit.path.clone(),
                failure,
            }));
        for entry in scan.children.into_iter().rev() {
            stack.push(Visit {
                node: entry.node,
                path: visit.path.combine(&entry.fragment),
                parent: Some(visit.node),
                depth: visit.depth + 1,
                root_index: visit.root_index,
                entry: Some(entry),
            });
        }
        ancestors.push(visit.node);
        walk.visits.push(visit);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{ArborError, Result};
use crate::model::{Document, Edge, NodeId, Value};
use crate::path::NodePath;

/// One elementary, invertible edit
///
/// Node locations are absolute paths. `NodeMove::to` is the destination as
/// seen after the node has been detached from `from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edit {
    /// A detached node was attached at `at`
    NodeCreate { node: NodeId, at: NodePath },
    /// The node at `at` was detached (it stays alive for undo)
    NodeDelete { node: NodeId, at: NodePath },
    NodeMove {
        node: NodeId,
        from: NodePath,
        to: NodePath,
    },
    /// A member of `node` changed from `old` to `new`
    FieldModify {
        node: NodeId,
        member: NodePath,
        old: Value,
        new: Value,
    },
    EdgeCreate { edge: Edge },
    EdgeRemove { edge: Edge },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    NodeCreate,
    NodeDelete,
    NodeMove,
    FieldModify,
    EdgeCreate,
    EdgeRemove,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::NodeCreate => "node_create",
            OperationKind::NodeDelete => "node_delete",
            OperationKind::NodeMove => "node_move",
            OperationKind::FieldModify => "field_modify",
            OperationKind::EdgeCreate => "edge_create",
            OperationKind::EdgeRemove => "edge_remove",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of an operation: kind, target and path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpIdentity {
    pub kind: OperationKind,
    pub target: String,
    pub path: String,
}

impl fmt::Display for OpIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.kind, self.target, self.path)
    }
}

/// A recorded edit with the time it was made
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub edit: Edit,
    pub timestamp_ms: u64,
}

fn precondition(op: &Operation, reason: impl Into<String>) -> ArborError {
    ArborError::PreconditionFailed {
        op: op.identity().to_string(),
        reason: reason.into(),
    }
}

impl Operation {
    pub fn new(edit: Edit, timestamp_ms: u64) -> Self {
        Self { edit, timestamp_ms }
    }

    pub fn kind(&self) -> OperationKind {
        match self.edit {
            Edit::NodeCreate { .. } => OperationKind::NodeCreate,
            Edit::NodeDelete { .. } => OperationKind::NodeDelete,
            Edit::NodeMove { .. } => OperationKind::NodeMove,
            Edit::FieldModify { .. } => OperationKind::FieldModify,
            Edit::EdgeCreate { .. } => OperationKind::EdgeCreate,
            Edit::EdgeRemove { .. } => OperationKind::EdgeRemove,
        }
    }

    pub fn identity(&self) -> OpIdentity {
        let (target, path) = match &self.edit {
            Edit::NodeCreate { node, at } | Edit::NodeDelete { node, at } => {
                (node.to_string(), at.to_string())
            }
            Edit::NodeMove { node, to, .. } => (node.to_string(), to.to_string()),
            Edit::FieldModify { node, member, .. } => (node.to_string(), member.to_string()),
            Edit::EdgeCreate { edge } | Edit::EdgeRemove { edge } => (edge.to_string(), String::new()),
        };
        OpIdentity {
            kind: self.kind(),
            target,
            path,
        }
    }

    /// Only field modifications coalesce
    pub fn is_mergeable(&self) -> bool {
        matches!(self.edit, Edit::FieldModify { .. })
    }

    /// Every node handle this operation needs to stay alive for replay
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        match &self.edit {
            Edit::NodeCreate { node, .. } | Edit::NodeDelete { node, .. } | Edit::NodeMove { node, .. } => {
                nodes.push(*node)
            }
            Edit::FieldModify { node, old, new, .. } => {
                nodes.push(*node);
                old.collect_nodes(&mut nodes);
                new.collect_nodes(&mut nodes);
            }
            Edit::EdgeCreate { edge } | Edit::EdgeRemove { edge } => {
                nodes.push(edge.from.node);
                nodes.push(edge.to.node);
            }
        }
        nodes
    }

    /// Apply the edit forward
    ///
    /// Applying an edit whose effect is already present is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `PreconditionFailed` if the document is not in a state the
    /// edit can apply to, or the underlying document error.
    pub fn execute(&self, doc: &mut Document) -> Result<()> {
        match &self.edit {
            Edit::NodeCreate { node, at } => {
                if doc.node_at(at) != Some(*node) {
                    doc.insert_node(at, *node)?;
                }
                Ok(())
            }
            Edit::NodeDelete { node, at } => {
                if doc.node_at(at) == Some(*node) {
                    doc.detach_node(at)?;
                }
                Ok(())
            }
            Edit::NodeMove { node, from, to } => {
                if from == to {
                    return Ok(());
                }
                if doc.node_at(from) != Some(*node) {
                    if doc.node_at(to) == Some(*node) {
                        return Ok(());
                    }
                    return Err(precondition(self, format!("node is not at {}", from)));
                }
                doc.detach_node(from)?;
                doc.insert_node(to, *node)
            }
            Edit::FieldModify { node, member, new, .. } => {
                doc.set_member(*node, member, new.clone())?;
                Ok(())
            }
            Edit::EdgeCreate { edge } => {
                doc.add_edge(edge.clone());
                Ok(())
            }
            Edit::EdgeRemove { edge } => {
                doc.remove_edge(edge);
                Ok(())
            }
        }
    }

    /// Apply the inverse edit
    ///
    /// # Errors
    ///
    /// Returns `PreconditionFailed` or the underlying document error.
    pub fn undo(&self, doc: &mut Document) -> Result<()> {
        match &self.edit {
            Edit::NodeCreate { node, at } => {
                let removed = doc.detach_node(at)?;
                if removed != *node {
                    return Err(ArborError::NodeMismatch {
                        path: at.to_string(),
                        expected: node.to_string(),
                        found: removed.to_string(),
                    });
                }
                Ok(())
            }
            Edit::NodeDelete { node, at } => doc.insert_node(at, *node),
            Edit::NodeMove { node, from, to } => {
                if from == to {
                    return Ok(());
                }
                let removed = doc.detach_node(to)?;
                if removed != *node {
                    return Err(ArborError::NodeMismatch {
                        path: to.to_string(),
                        expected: node.to_string(),
                        found: removed.to_string(),
                    });
                }
                doc.insert_node(from, *node)
            }
            Edit::FieldModify { node, member, old, .. } => {
                doc.set_member(*node, member, old.clone())?;
                Ok(())
            }
            Edit::EdgeCreate { edge } => {
                doc.remove_edge(edge);
                Ok(())
            }
            Edit::EdgeRemove { edge } => {
                doc.add_edge(edge.clone());
                Ok(())
            }
        }
    }

    /// Check that [`Operation::undo`] can apply to the document
    ///
    /// # Errors
    ///
    /// Returns `PreconditionFailed` naming what does not hold.
    pub fn check_undo(&self, doc: &Document) -> Result<()> {
        match &self.edit {
            Edit::NodeCreate { node, at } => expect_at(self, doc, *node, at),
            Edit::NodeDelete { node, at } => {
                expect_alive(self, doc, *node)?;
                if doc.node_at(at) == Some(*node) {
                    return Err(precondition(self, format!("node is already at {}", at)));
                }
                Ok(())
            }
            Edit::NodeMove { node, from, to } if from != to => expect_at(self, doc, *node, to),
            Edit::NodeMove { node, .. } | Edit::FieldModify { node, .. } => {
                expect_alive(self, doc, *node)
            }
            Edit::EdgeCreate { .. } => Ok(()),
            Edit::EdgeRemove { edge } => {
                expect_alive(self, doc, edge.from.node)?;
                expect_alive(self, doc, edge.to.node)
            }
        }
    }

    /// Check that [`Operation::execute`] can apply to the document
    ///
    /// # Errors
    ///
    /// Returns `PreconditionFailed` naming what does not hold.
    pub fn check_redo(&self, doc: &Document) -> Result<()> {
        match &self.edit {
            Edit::NodeCreate { node, .. } | Edit::NodeDelete { node, .. } | Edit::FieldModify { node, .. } => {
                expect_alive(self, doc, *node)
            }
            Edit::NodeMove { node, from, to } => {
                if doc.node_at(from) == Some(*node) || doc.node_at(to) == Some(*node) {
                    Ok(())
                } else {
                    Err(precondition(self, format!("node is not at {}", from)))
                }
            }
            Edit::EdgeCreate { edge } => {
                expect_alive(self, doc, edge.from.node)?;
                expect_alive(self, doc, edge.to.node)
            }
            Edit::EdgeRemove { .. } => Ok(()),
        }
    }

    pub fn can_undo(&self, doc: &Document) -> bool {
        self.check_undo(doc).is_ok()
    }

    pub fn can_redo(&self, doc: &Document) -> bool {
        self.check_redo(doc).is_ok()
    }
}

fn expect_alive(op: &Operation, doc: &Document, node: NodeId) -> Result<()> {
    if doc.is_alive(node) {
        Ok(())
    } else {
        Err(precondition(op, format!("node {} is gone", node)))
    }
}

fn expect_at(op: &Operation, doc: &Document, node: NodeId, at: &NodePath) -> Result<()> {
    if doc.node_at(at) == Some(node) {
        Ok(())
    } else {
        Err(precondition(op, format!("node {} is not at {}", node, at)))
    }
}

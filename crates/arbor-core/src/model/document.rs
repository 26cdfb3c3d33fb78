use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::{Edge, NodeId, NodeRecord, Value};
use crate::errors::{ArborError, Result};
use crate::path::{NodePath, PathPart};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ArenaSlot {
    generation: u32,
    record: Option<NodeRecord>,
}

/// What a path resolves to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target<'a> {
    /// The root collection (empty path)
    Roots,
    /// A node reference
    Node(NodeId),
    /// Any other member value
    Value(&'a Value),
}

/// Where the last selector of a path applies
enum Owner {
    Roots,
    Member { node: NodeId, route: Vec<PathPart> },
}

/// Mutable container reached by walking a route inside one node
enum Container<'a> {
    Fields(&'a mut BTreeMap<String, Value>),
    Value(&'a mut Value),
}

impl<'a> Container<'a> {
    fn from_value(value: &'a mut Value) -> Self {
        match value {
            Value::Record(entries) => Container::Fields(entries),
            other => Container::Value(other),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Container::Fields(_) => "record",
            Container::Value(v) => v.shape(),
        }
    }
}

fn unresolved(path: &NodePath, reason: impl Into<String>) -> ArborError {
    ArborError::PathUnresolved {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn descend(value: &Value) -> Target<'_> {
    match value {
        Value::Node(id) => Target::Node(*id),
        other => Target::Value(other),
    }
}

/// The editable forest
///
/// Owns every node in a generational arena, the ordered root collection and
/// the edge set. Nodes detached from the forest stay alive in the arena until
/// [`Document::purge_unreachable`] frees them, so an undo can re-attach the
/// very same handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    slots: Vec<ArenaSlot>,
    free: Vec<u32>,
    roots: Vec<NodeId>,
    edges: BTreeSet<Edge>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Arena =====

    /// Allocate a detached node
    pub fn create_node(&mut self, record: NodeRecord) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            return NodeId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(ArenaSlot {
            generation: 0,
            record: Some(record),
        });
        NodeId::new(index, 0)
    }

    fn slot(&self, id: NodeId) -> Result<&ArenaSlot> {
        let slot = self
            .slots
            .get(id.index() as usize)
            .ok_or_else(|| ArborError::NodeNotFound {
                node_id: id.to_string(),
            })?;
        if slot.generation != id.generation() || slot.record.is_none() {
            return Err(ArborError::StaleHandle {
                node_id: id.to_string(),
            });
        }
        Ok(slot)
    }

    /// Get a node record
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for a handle this arena never issued and
    /// `StaleHandle` for a handle whose node was freed.
    pub fn node(&self, id: NodeId) -> Result<&NodeRecord> {
        self.slot(id)?
            .record
            .as_ref()
            .ok_or_else(|| ArborError::StaleHandle {
                node_id: id.to_string(),
            })
    }

    /// Get a mutable node record
    ///
    /// Mutating through this bypasses history; the caller records the edit.
    ///
    /// # Errors
    ///
    /// Same as [`Document::node`].
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord> {
        self.slot(id)?;
        self.slots[id.index() as usize]
            .record
            .as_mut()
            .ok_or_else(|| ArborError::StaleHandle {
                node_id: id.to_string(),
            })
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.slot(id).is_ok()
    }

    /// Live nodes in arena order, attached or not
    pub fn live_nodes(&self) -> impl Iterator<Item = (NodeId, &NodeRecord)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.record
                .as_ref()
                .map(|record| (NodeId::new(i as u32, slot.generation), record))
        })
    }

    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.record.is_some()).count()
    }

    fn free_slot(&mut self, index: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            if slot.record.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
    }

    // ===== Roots =====

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    // ===== Resolution =====

    /// Resolve an absolute path
    ///
    /// # Errors
    ///
    /// Returns `PathUnresolved` when a selector does not apply to the value
    /// it meets, and handle errors when the path crosses a dead node.
    pub fn resolve(&self, path: &NodePath) -> Result<Target<'_>> {
        let parts = path.parts();
        let Some((first, rest)) = parts.split_first() else {
            return Ok(Target::Roots);
        };
        let root_index = first
            .as_index()
            .ok_or_else(|| unresolved(path, "path must start with a root index"))?;
        let root = *self
            .roots
            .get(root_index)
            .ok_or_else(|| unresolved(path, format!("no root at index {}", root_index)))?;

        let mut cursor = Target::Node(root);
        for part in rest {
            cursor = self.step(cursor, part, path)?;
        }
        Ok(cursor)
    }

    fn step<'a>(&'a self, cursor: Target<'a>, part: &PathPart, path: &NodePath) -> Result<Target<'a>> {
        match (cursor, part) {
            (Target::Node(id), PathPart::Field(name)) => {
                let value = self
                    .node(id)?
                    .fields
                    .get(name)
                    .ok_or_else(|| unresolved(path, format!("node {} has no member '{}'", id, name)))?;
                Ok(descend(value))
            }
            (Target::Value(Value::List(items)), PathPart::Index(i)) => items
                .get(*i)
                .map(descend)
                .ok_or_else(|| unresolved(path, format!("index {} out of range", i))),
            (Target::Value(Value::Record(entries)), PathPart::Field(name)) => entries
                .get(name)
                .map(descend)
                .ok_or_else(|| unresolved(path, format!("record has no entry '{}'", name))),
            (Target::Node(id), PathPart::Index(i)) => Err(unresolved(
                path,
                format!("cannot index node {} with [{}]", id, i),
            )),
            (Target::Value(value), _) => Err(unresolved(
                path,
                format!("cannot select into {} value", value.shape()),
            )),
            (Target::Roots, _) => Err(unresolved(path, "selector applied to root collection")),
        }
    }

    /// Live node at `path`, if the path resolves to one
    pub fn node_at(&self, path: &NodePath) -> Option<NodeId> {
        match self.resolve(path) {
            Ok(Target::Node(id)) if self.is_alive(id) => Some(id),
            _ => None,
        }
    }

    /// Read a member of a node by relative member path
    ///
    /// The member path stays inside the node; it may pass through records and
    /// lists but not through another node.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPath`, `PathUnresolved`, or handle errors.
    pub fn member(&self, node: NodeId, member: &NodePath) -> Result<&Value> {
        let parts = member.parts();
        let Some((first, rest)) = parts.split_first() else {
            return Err(ArborError::EmptyPath);
        };
        let name = first
            .as_field()
            .ok_or_else(|| unresolved(member, "member path must start with a field"))?;
        let mut value = self
            .node(node)?
            .fields
            .get(name)
            .ok_or_else(|| unresolved(member, format!("node {} has no member '{}'", node, name)))?;
        for part in rest {
            value = match (value, part) {
                (Value::List(items), PathPart::Index(i)) => items
                    .get(*i)
                    .ok_or_else(|| unresolved(member, format!("index {} out of range", i)))?,
                (Value::Record(entries), PathPart::Field(name)) => entries
                    .get(name)
                    .ok_or_else(|| unresolved(member, format!("record has no entry '{}'", name)))?,
                (other, _) => {
                    return Err(unresolved(
                        member,
                        format!("cannot select into {} value", other.shape()),
                    ))
                }
            };
        }
        Ok(value)
    }

    /// Member value, with a missing member read as `Null`
    pub fn member_or_null(&self, node: NodeId, member: &NodePath) -> Result<Value> {
        match self.member(node, member) {
            Ok(value) => Ok(value.clone()),
            Err(ArborError::PathUnresolved { .. }) => Ok(Value::Null),
            Err(e) => Err(e),
        }
    }

    /// Write a member of a node, returning the previous value
    ///
    /// A missing last member is created; a missing intermediate is an error.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPath`, `PathUnresolved`, `SlotMismatch`,
    /// `IndexOutOfRange`, or handle errors.
    pub fn set_member(&mut self, node: NodeId, member: &NodePath, value: Value) -> Result<Value> {
        let (last, route) = member.parts().split_last().ok_or(ArborError::EmptyPath)?;
        let record = self.node_mut(node)?;
        let container = walk_route(&mut record.fields, route, member)?;
        match (container, last) {
            (Container::Fields(entries), PathPart::Field(name)) => {
                Ok(entries.insert(name.clone(), value).unwrap_or_default())
            }
            (Container::Value(Value::List(items)), PathPart::Index(i)) => {
                let len = items.len();
                let slot = items.get_mut(*i).ok_or_else(|| ArborError::IndexOutOfRange {
                    path: member.to_string(),
                    index: *i,
                    len,
                })?;
                Ok(std::mem::replace(slot, value))
            }
            (container, _) => Err(ArborError::SlotMismatch {
                path: member.to_string(),
                expected: "record or list".to_string(),
                found: container.shape().to_string(),
            }),
        }
    }

    /// Split a path into the node that owns its last selector and the route
    /// inside that node
    fn locate_owner(&self, path: &NodePath) -> Result<Owner> {
        let parts = path.parts();
        let parent_len = parts.len().checked_sub(1).ok_or(ArborError::EmptyPath)?;
        if parent_len == 0 {
            return Ok(Owner::Roots);
        }

        let root_index = parts[0]
            .as_index()
            .ok_or_else(|| unresolved(path, "path must start with a root index"))?;
        let mut owner = *self
            .roots
            .get(root_index)
            .ok_or_else(|| unresolved(path, format!("no root at index {}", root_index)))?;
        let mut route_start = 1;
        let mut cursor = Target::Node(owner);

        for (j, part) in parts.iter().enumerate().take(parent_len).skip(1) {
            if let Target::Node(id) = cursor {
                owner = id;
                route_start = j;
            }
            cursor = self.step(cursor, part, path)?;
        }
        if let Target::Node(id) = cursor {
            owner = id;
            route_start = parent_len;
        }
        self.node(owner)?;

        Ok(Owner::Member {
            node: owner,
            route: parts[route_start..parent_len].to_vec(),
        })
    }

    // ===== Structural mutation =====

    /// Attach a live node at `path`
    ///
    /// - `[i]` inserts into the root collection at `i`
    /// - `...List[i]` inserts into a list at `i` (later siblings shift up)
    /// - `...Member` assigns an empty (absent or null) single slot
    ///
    /// # Errors
    ///
    /// Returns `InsertTargetOccupied`, `IndexOutOfRange`, `SlotMismatch`,
    /// `NodeAlreadyAttached` (root duplicates), path or handle errors.
    pub fn insert_node(&mut self, path: &NodePath, node: NodeId) -> Result<()> {
        self.node(node)?;
        let last = path.last_part().cloned().ok_or(ArborError::EmptyPath)?;

        match self.locate_owner(path)? {
            Owner::Roots => {
                let index = last
                    .as_index()
                    .ok_or_else(|| unresolved(path, "root selector must be an index"))?;
                if index > self.roots.len() {
                    return Err(ArborError::IndexOutOfRange {
                        path: path.to_string(),
                        index,
                        len: self.roots.len(),
                    });
                }
                if let Some(existing) = self.roots.iter().position(|r| *r == node) {
                    return Err(ArborError::NodeAlreadyAttached {
                        node_id: node.to_string(),
                        path: NodePath::root(existing).to_string(),
                    });
                }
                self.roots.insert(index, node);
                Ok(())
            }
            Owner::Member { node: owner, route } => {
                let record = self.node_mut(owner)?;
                match (walk_route(&mut record.fields, &route, path)?, &last) {
                    (Container::Value(Value::List(items)), PathPart::Index(i)) => {
                        if *i > items.len() {
                            return Err(ArborError::IndexOutOfRange {
                                path: path.to_string(),
                                index: *i,
                                len: items.len(),
                            });
                        }
                        items.insert(*i, Value::Node(node));
                        Ok(())
                    }
                    (Container::Fields(entries), PathPart::Field(name)) => {
                        let slot = entries.entry(name.clone()).or_default();
                        if !slot.is_null() {
                            return Err(ArborError::InsertTargetOccupied {
                                path: path.to_string(),
                            });
                        }
                        *slot = Value::Node(node);
                        Ok(())
                    }
                    (container, _) => Err(ArborError::SlotMismatch {
                        path: path.to_string(),
                        expected: "list or empty slot".to_string(),
                        found: container.shape().to_string(),
                    }),
                }
            }
        }
    }

    /// Detach the node at `path` and return its handle
    ///
    /// The node stays alive in the arena. Removing a list element shifts every
    /// later sibling down by one; a single slot becomes `Null`.
    ///
    /// # Errors
    ///
    /// Returns `SlotMismatch` if the path does not hold a node reference,
    /// `IndexOutOfRange`, path or handle errors.
    pub fn detach_node(&mut self, path: &NodePath) -> Result<NodeId> {
        let last = path.last_part().cloned().ok_or(ArborError::EmptyPath)?;

        match self.locate_owner(path)? {
            Owner::Roots => {
                let index = last
                    .as_index()
                    .ok_or_else(|| unresolved(path, "root selector must be an index"))?;
                if index >= self.roots.len() {
                    return Err(ArborError::IndexOutOfRange {
                        path: path.to_string(),
                        index,
                        len: self.roots.len(),
                    });
                }
                Ok(self.roots.remove(index))
            }
            Owner::Member { node: owner, route } => {
                let record = self.node_mut(owner)?;
                match (walk_route(&mut record.fields, &route, path)?, &last) {
                    (Container::Value(Value::List(items)), PathPart::Index(i)) => {
                        match items.get(*i) {
                            Some(Value::Node(id)) => {
                                let id = *id;
                                items.remove(*i);
                                Ok(id)
                            }
                            Some(other) => Err(ArborError::SlotMismatch {
                                path: path.to_string(),
                                expected: "node".to_string(),
                                found: other.shape().to_string(),
                            }),
                            None => Err(ArborError::IndexOutOfRange {
                                path: path.to_string(),
                                index: *i,
                                len: items.len(),
                            }),
                        }
                    }
                    (Container::Fields(entries), PathPart::Field(name)) => {
                        let slot = entries
                            .get_mut(name)
                            .ok_or_else(|| unresolved(path, format!("no member '{}'", name)))?;
                        match *slot {
                            Value::Node(id) => {
                                *slot = Value::Null;
                                Ok(id)
                            }
                            ref other => Err(ArborError::SlotMismatch {
                                path: path.to_string(),
                                expected: "node".to_string(),
                                found: other.shape().to_string(),
                            }),
                        }
                    }
                    (container, _) => Err(ArborError::SlotMismatch {
                        path: path.to_string(),
                        expected: "list or slot".to_string(),
                        found: container.shape().to_string(),
                    }),
                }
            }
        }
    }

    // ===== Edges =====

    /// Add an edge; returns false if it was already present
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        self.edges.insert(edge)
    }

    /// Remove an edge; returns false if it was not present
    pub fn remove_edge(&mut self, edge: &Edge) -> bool {
        self.edges.remove(edge)
    }

    pub fn has_edge(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter()
    }

    // ===== Reclamation =====

    /// Free every node that is neither reachable from a root nor retained
    ///
    /// Reachability follows every node reference inside member values, so a
    /// retained detached node keeps its whole subtree alive. Edges touching a
    /// freed node are dropped. Returns the number of nodes freed.
    pub fn purge_unreachable(&mut self, retained: &HashSet<NodeId>) -> usize {
        let mut marked: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = self
            .roots
            .iter()
            .chain(retained.iter())
            .copied()
            .filter(|id| self.is_alive(*id))
            .collect();

        while let Some(id) = stack.pop() {
            if !marked.insert(id) {
                continue;
            }
            if let Ok(record) = self.node(id) {
                let mut refs = Vec::new();
                record.fields.values().for_each(|v| v.collect_nodes(&mut refs));
                stack.extend(refs.into_iter().filter(|r| self.is_alive(*r)));
            }
        }

        let doomed: Vec<NodeId> = self
            .live_nodes()
            .map(|(id, _)| id)
            .filter(|id| !marked.contains(id))
            .collect();
        for id in &doomed {
            self.free_slot(id.index());
        }
        if !doomed.is_empty() {
            self.edges
                .retain(|e| marked.contains(&e.from.node) && marked.contains(&e.to.node));
        }
        doomed.len()
    }
}

/// Walk `route` from a node's fields to the container the last selector
/// applies to
fn walk_route<'a>(
    fields: &'a mut BTreeMap<String, Value>,
    route: &[PathPart],
    path: &NodePath,
) -> Result<Container<'a>> {
    let mut container = Container::Fields(fields);
    for part in route {
        container = match (container, part) {
            (Container::Fields(entries), PathPart::Field(name)) => {
                let value = entries
                    .get_mut(name)
                    .ok_or_else(|| unresolved(path, format!("no member '{}'", name)))?;
                Container::from_value(value)
            }
            (Container::Value(Value::List(items)), PathPart::Index(i)) => {
                let value = items
                    .get_mut(*i)
                    .ok_or_else(|| unresolved(path, format!("index {} out of range", i)))?;
                Container::from_value(value)
            }
            (container, _) => {
                return Err(unresolved(
                    path,
                    format!("cannot select into {} value", container.shape()),
                ))
            }
        };
    }
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_with_items(doc: &mut Document, n: usize) -> (NodeId, Vec<NodeId>) {
        let items: Vec<NodeId> = (0..n)
            .map(|i| doc.create_node(NodeRecord::new("Item").with("Title", format!("item {i}"))))
            .collect();
        let root = doc.create_node(NodeRecord::new("Group").with("Items", Value::nodes(items.clone())));
        doc.insert_node(&NodePath::root(doc.roots().len()), root).unwrap();
        (root, items)
    }

    #[test]
    fn test_stale_handle_after_purge_and_reuse() {
        let mut doc = Document::new();
        let a = doc.create_node(NodeRecord::new("Item"));
        assert_eq!(doc.purge_unreachable(&HashSet::new()), 1);

        let b = doc.create_node(NodeRecord::new("Item"));
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(matches!(doc.node(a), Err(ArborError::StaleHandle { .. })));
        assert!(doc.node(b).is_ok());
    }

    #[test]
    fn test_resolve_list_element() {
        let mut doc = Document::new();
        let (_, items) = group_with_items(&mut doc, 3);
        let path = NodePath::parse("[0].Items[2]").unwrap();
        assert_eq!(doc.node_at(&path), Some(items[2]));
    }

    #[test]
    fn test_detach_shifts_later_siblings() {
        let mut doc = Document::new();
        let (_, items) = group_with_items(&mut doc, 3);

        let removed = doc.detach_node(&NodePath::parse("[0].Items[0]").unwrap()).unwrap();
        assert_eq!(removed, items[0]);
        assert!(doc.is_alive(removed));
        assert_eq!(doc.node_at(&NodePath::parse("[0].Items[0]").unwrap()), Some(items[1]));
        assert_eq!(doc.node_at(&NodePath::parse("[0].Items[1]").unwrap()), Some(items[2]));
    }

    #[test]
    fn test_single_slot_insert_and_occupied() {
        let mut doc = Document::new();
        let (root, _) = group_with_items(&mut doc, 0);
        let header = doc.create_node(NodeRecord::new("Header"));
        let other = doc.create_node(NodeRecord::new("Header"));
        let path = NodePath::root(0).field("Header");

        doc.insert_node(&path, header).unwrap();
        assert_eq!(doc.node_at(&path), Some(header));
        assert!(matches!(
            doc.insert_node(&path, other),
            Err(ArborError::InsertTargetOccupied { .. })
        ));

        assert_eq!(doc.detach_node(&path).unwrap(), header);
        assert_eq!(doc.node(root).unwrap().get("Header"), Some(&Value::Null));
    }

    #[test]
    fn test_nested_route_insert() {
        let mut doc = Document::new();
        let mut wrapper = BTreeMap::new();
        wrapper.insert("Inner".to_string(), Value::Null);
        let root = doc.create_node(NodeRecord::new("Frame").with("Body", Value::Record(wrapper)));
        doc.insert_node(&NodePath::root(0), root).unwrap();

        let child = doc.create_node(NodeRecord::new("Item"));
        let path = NodePath::parse("[0].Body.Inner").unwrap();
        doc.insert_node(&path, child).unwrap();
        assert_eq!(doc.node_at(&path), Some(child));
    }

    #[test]
    fn test_set_member_returns_old_value() {
        let mut doc = Document::new();
        let (_, items) = group_with_items(&mut doc, 1);
        let title = NodePath::empty().field("Title");

        let old = doc.set_member(items[0], &title, Value::from("renamed")).unwrap();
        assert_eq!(old, Value::from("item 0"));
        assert_eq!(doc.member(items[0], &title).unwrap(), &Value::from("renamed"));

        let missing = doc.set_member(items[0], &NodePath::empty().field("Fresh"), Value::Int(1)).unwrap();
        assert_eq!(missing, Value::Null);
    }

    #[test]
    fn test_root_insert_rejects_duplicate() {
        let mut doc = Document::new();
        let (root, _) = group_with_items(&mut doc, 0);
        assert!(matches!(
            doc.insert_node(&NodePath::root(1), root),
            Err(ArborError::NodeAlreadyAttached { .. })
        ));
    }

    #[test]
    fn test_purge_keeps_retained_subtree() {
        let mut doc = Document::new();
        let (_, items) = group_with_items(&mut doc, 2);
        let detached = doc.detach_node(&NodePath::root(0)).unwrap();

        let mut retained = HashSet::new();
        retained.insert(detached);
        assert_eq!(doc.purge_unreachable(&retained), 0);
        assert!(doc.is_alive(items[1]));

        assert_eq!(doc.purge_unreachable(&HashSet::new()), 3);
        assert_eq!(doc.node_count(), 0);
    }
}

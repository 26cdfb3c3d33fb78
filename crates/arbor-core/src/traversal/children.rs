use crate::errors::Result;
use crate::model::{Document, NodeId, Value};
use crate::path::NodePath;
use crate::schema::{ResolvedSlot, SchemaRegistry, SlotKind};

/// One child of a node, as found through a declared slot
#[derive(Debug, Clone, PartialEq)]
pub struct ChildEntry {
    pub node: NodeId,
    /// Path from the parent to the child (`Items[2]`, `Body.Inner`)
    pub fragment: NodePath,
    pub priority: i32,
    pub slot_ordinal: usize,
    pub slot: String,
    /// Position inside a collection slot
    pub list_index: Option<usize>,
}

impl ChildEntry {
    /// Sibling ordering key: priority, declaration order, list position
    pub fn sort_key(&self) -> (i32, usize, usize) {
        (self.priority, self.slot_ordinal, self.list_index.unwrap_or(0))
    }
}

/// A member that could not be read as a child slot
#[derive(Debug, Clone, PartialEq)]
pub struct AccessFailure {
    pub node: NodeId,
    /// Member path relative to the node
    pub member: NodePath,
    pub reason: String,
}

/// Result of scanning one node's child slots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildScan {
    pub children: Vec<ChildEntry>,
    pub failures: Vec<AccessFailure>,
}

/// Enumerate the children of `node` in slot-priority then list order
///
/// Absent and null slot values are empty slots. A member of the wrong shape
/// or a reference to a dead node is recorded as an [`AccessFailure`] and
/// skipped; the remaining slots are still scanned.
///
/// # Errors
///
/// Returns `NodeNotFound` or `StaleHandle` if `node` itself is not alive.
pub fn scan_children(doc: &Document, registry: &SchemaRegistry, node: NodeId) -> Result<ChildScan> {
    let record = doc.node(node)?;
    let resolved = registry.resolve(&record.type_name);
    let mut scan = ChildScan::default();

    for slot in &resolved.slots {
        match doc.member(node, &slot.member) {
            Ok(value) => scan_slot(doc, node, slot, value, &mut scan),
            // absent member or wrapper entry
            Err(_) if is_absent(doc, node, slot) => {}
            Err(e) => scan.failures.push(AccessFailure {
                node,
                member: slot.member.clone(),
                reason: e.to_string(),
            }),
        }
    }

    for failure in &scan.failures {
        tracing::warn!(
            node_id = %failure.node,
            member = %failure.member,
            reason = %failure.reason,
            "child slot access failed; member skipped"
        );
    }
    Ok(scan)
}

/// True when the slot's route stops at a missing or null entry
fn is_absent(doc: &Document, node: NodeId, slot: &ResolvedSlot) -> bool {
    let mut prefix = NodePath::empty();
    for part in slot.member.parts() {
        prefix.push(part.clone());
        match doc.member(node, &prefix) {
            Ok(Value::Null) => return true,
            Ok(Value::Record(_)) => continue,
            Ok(_) => return false,
            Err(_) => return true,
        }
    }
    false
}

fn scan_slot(doc: &Document, node: NodeId, slot: &ResolvedSlot, value: &Value, scan: &mut ChildScan) {
    let mut fail = |member: NodePath, reason: String| {
        scan.failures.push(AccessFailure { node, member, reason });
    };

    let mut children = Vec::new();
    match (slot.kind, value) {
        (_, Value::Null) => {}
        (SlotKind::Single, Value::Node(child)) => {
            if doc.is_alive(*child) {
                children.push((*child, slot.member.clone(), None));
            } else {
                fail(slot.member.clone(), format!("dangling reference to {}", child));
            }
        }
        (SlotKind::Collection, Value::List(items)) => {
            for (i, item) in items.iter().enumerate() {
                let member = slot.member.append(i);
                match item {
                    Value::Node(child) if doc.is_alive(*child) => {
                        children.push((*child, member, Some(i)))
                    }
                    Value::Node(child) => fail(member, format!("dangling reference to {}", child)),
                    other => fail(member, format!("expected node, found {}", other.shape())),
                }
            }
        }
        (SlotKind::Single, other) => fail(
            slot.member.clone(),
            format!("expected node, found {}", other.shape()),
        ),
        (SlotKind::Collection, other) => fail(
            slot.member.clone(),
            format!("expected list, found {}", other.shape()),
        ),
    }

    scan.children
        .extend(children.into_iter().map(|(child, fragment, list_index)| ChildEntry {
            node: child,
            fragment,
            priority: slot.priority,
            slot_ordinal: slot.ordinal,
            slot: slot.name.clone(),
            list_index,
        }));
}

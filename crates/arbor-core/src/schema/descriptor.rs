use serde::{Deserialize, Serialize};

use crate::path::NodePath;

/// Shape of a child slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// At most one child node
    Single,
    /// Ordered list of child nodes
    Collection,
}

/// Declaration of one child slot on a node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDescriptor {
    /// Member name on the node
    pub name: String,

    pub kind: SlotKind,

    /// Lower sorts first among sibling slots
    pub priority: i32,

    /// Wrapper entries between the member and the child value, for slots
    /// whose node is embedded inside a record (`Body.Inner`)
    #[serde(default)]
    pub route: Vec<String>,
}

impl SlotDescriptor {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SlotKind::Single,
            priority: 0,
            route: Vec::new(),
        }
    }

    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SlotKind::Collection,
            priority: 0,
            route: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Reach the child through wrapper entries below the member
    pub fn nested<I, S>(mut self, route: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.route = route.into_iter().map(Into::into).collect();
        self
    }

    /// Member path of the slot value relative to its node
    pub fn member_path(&self) -> NodePath {
        self.route
            .iter()
            .fold(NodePath::empty().field(&self.name), |path, entry| {
                path.field(entry)
            })
    }
}

/// Child-slot declarations for one node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub type_name: String,
    pub slots: Vec<SlotDescriptor>,
}

impl TypeDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            slots: Vec::new(),
        }
    }

    /// Builder: add a slot
    pub fn slot(mut self, slot: SlotDescriptor) -> Self {
        self.slots.push(slot);
        self
    }

    /// Builder: add a single slot with a priority
    pub fn single(self, name: impl Into<String>, priority: i32) -> Self {
        self.slot(SlotDescriptor::single(name).with_priority(priority))
    }

    /// Builder: add a collection slot with a priority
    pub fn collection(self, name: impl Into<String>, priority: i32) -> Self {
        self.slot(SlotDescriptor::collection(name).with_priority(priority))
    }
}

/// A family of node types that describes its own child slots
///
/// Implemented once per node-type family and registered with a
/// [`SchemaRegistry`](super::SchemaRegistry) at session start.
pub trait SchemaSource {
    fn descriptors(&self) -> Vec<TypeDescriptor>;
}

impl SchemaSource for Vec<TypeDescriptor> {
    fn descriptors(&self) -> Vec<TypeDescriptor> {
        self.clone()
    }
}

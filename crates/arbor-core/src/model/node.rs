use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Generational handle to a node in a [`Document`](super::Document) arena
///
/// Identity of a node is identity of its handle. A handle whose slot has
/// been freed (and possibly reused) no longer resolves, so stale references
/// fail loudly instead of reaching a different node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}v{}", self.index, self.generation)
    }
}

/// Member value of a node
///
/// `Node` values are child references; whether a member counts as a child
/// slot is decided by the node type's descriptor, not by the value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Node(NodeId),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Short shape name used in diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Node(_) => "node",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Build a list of node references
    pub fn nodes(ids: impl IntoIterator<Item = NodeId>) -> Self {
        Value::List(ids.into_iter().map(Value::Node).collect())
    }

    /// Every node handle referenced anywhere inside this value
    pub fn collect_nodes(&self, out: &mut Vec<NodeId>) {
        match self {
            Value::Node(id) => out.push(*id),
            Value::List(items) => items.iter().for_each(|v| v.collect_nodes(out)),
            Value::Record(entries) => entries.values().for_each(|v| v.collect_nodes(out)),
            _ => {}
        }
    }

    /// First NaN or infinite float anywhere inside this value
    pub fn find_non_finite(&self) -> Option<f64> {
        match self {
            Value::Float(f) if !f.is_finite() => Some(*f),
            Value::List(items) => items.iter().find_map(Value::find_non_finite),
            Value::Record(entries) => entries.values().find_map(Value::find_non_finite),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

/// Member name that holds a node's canvas position
pub const POSITION_MEMBER: &str = "Position";

/// Canvas position; display only, never structural
///
/// Stored as an ordinary `{x, y}` record member so moving a node on the
/// canvas is a field modification like any other edit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_value(self) -> Value {
        let mut entries = BTreeMap::new();
        entries.insert("x".to_string(), Value::Float(self.x));
        entries.insert("y".to_string(), Value::Float(self.y));
        Value::Record(entries)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Record(entries) = value else {
            return None;
        };
        let coord = |name: &str| match entries.get(name) {
            Some(Value::Float(v)) => Some(*v),
            Some(Value::Int(v)) => Some(*v as f64),
            _ => None,
        };
        Some(Self {
            x: coord("x")?,
            y: coord("y")?,
        })
    }
}

impl From<Position> for Value {
    fn from(position: Position) -> Self {
        position.to_value()
    }
}

/// One editable record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Type name, the key into the schema registry
    pub type_name: String,

    /// Named members in a stable order
    pub fields: BTreeMap<String, Value>,
}

impl NodeRecord {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder: set a member
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder: set the canvas position
    pub fn at(self, x: f64, y: f64) -> Self {
        self.with(POSITION_MEMBER, Position::new(x, y))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn position(&self) -> Option<Position> {
        self.get(POSITION_MEMBER).and_then(Position::from_value)
    }
}

//! Editable node graph: arena-owned nodes, member values and edges

mod document;
mod edge;
mod node;

pub use document::{Document, Target};
pub use edge::{Edge, PortRef};
pub use node::{NodeId, NodeRecord, Position, Value, POSITION_MEMBER};

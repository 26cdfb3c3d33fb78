//! Per-type child-slot metadata
//!
//! Each node type declares which of its members hold child nodes, whether a
//! slot holds one child or an ordered collection, and the priority used to
//! order sibling slots. The [`SchemaRegistry`] resolves and caches these
//! declarations for one editing session.

mod descriptor;
mod registry;

pub use descriptor::{SchemaSource, SlotDescriptor, SlotKind, TypeDescriptor};
pub use registry::{ResolvedSlot, ResolvedType, SchemaRegistry};

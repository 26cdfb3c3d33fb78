//! Schema-driven traversal of the node graph

mod children;
mod walk;

pub use children::{scan_children, AccessFailure, ChildEntry, ChildScan};
pub use walk::{walk_forest, CycleReport, FailureReport, SharedReport, Visit, Walk};

pub(crate) use walk::walk_subtree;

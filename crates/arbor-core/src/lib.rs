//! Arbor Core - editable node forest with a derived tree index and undo log
//!
//! This crate keeps three things consistent under fine-grained interactive
//! editing:
//! - the node graph (an arena-owned forest of typed records plus edges)
//! - a derived tree index of parent/child/order relationships, rebuilt fully
//!   or per affected subtree
//! - an edit history of invertible operations (or whole-document snapshots)
//!   with batching and merge coalescing
//!
//! Hosts normally drive everything through [`EditSession`].

pub mod clock;
pub mod config;
pub mod errors;
pub mod history;
pub mod index;
pub mod logging_facility;
pub mod model;
pub mod path;
pub mod schema;
pub mod session;
pub mod traversal;

// Macros expand to `$crate::core_types::...`
pub use arbor_core_types as core_types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Discipline, HistoryConfig, IndexConfig, SessionConfig};
pub use errors::{ArborError, ErrorKind, ExError, Result};
pub use history::{Edit, History, HistoryStep, Operation, OperationKind, RecordOutcome, StepReport};
pub use index::{NodeMetadata, TreeIndex};
pub use model::{Document, Edge, NodeId, NodeRecord, PortRef, Position, Value, POSITION_MEMBER};
pub use path::{NodePath, PathPart};
pub use schema::{SchemaRegistry, SchemaSource, SlotDescriptor, SlotKind, TypeDescriptor};
pub use session::{EditSession, SessionEvent};

//! Core types shared across arbor facilities
//!
//! This crate provides foundational types used by the editing core, its
//! error facility and its logging facility:
//!
//! - **Identifiers**: SessionId, StepId
//! - **Schema constants**: Canonical field keys and event names

pub mod ids;
pub mod schema;

pub use ids::{SessionId, StepId};

//! Structured logging for the editing core
//!
//! The core only emits `tracing` events; installing a subscriber is the
//! host's call, made once through [`init`]. Timed operations (index rebuilds,
//! undo and redo, snapshot capture, garbage collection) are bracketed with
//! [`log_op_start!`](crate::log_op_start) and
//! [`log_op_end!`](crate::log_op_end) or
//! [`log_op_error!`](crate::log_op_error), using the names in
//! `arbor_core_types::schema`.
//!
//! ```rust
//! use arbor_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

use std::time::Instant;

pub use init::{active_profile, init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};

/// Whole milliseconds since `started`, saturating
pub fn elapsed_ms(started: &Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

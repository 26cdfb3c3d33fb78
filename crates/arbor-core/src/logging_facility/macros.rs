//! Op-bracketing macros
//!
//! Every core operation worth timing emits one `start` event and exactly one
//! of `end` or `end_error`. The closing macros take the `Instant` captured at
//! the start and fill in `duration_ms` themselves.

/// Emit the `start` event of an operation, with optional extra fields
///
/// ```
/// # use arbor_core::log_op_start;
/// log_op_start!("index_rebuild");
/// log_op_start!("index_rebuild", scope = "full");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
            $($($field)*)?
        );
    };
}

/// Emit the `end` event of an operation started at `started`
///
/// ```
/// # use arbor_core::log_op_end;
/// let started = std::time::Instant::now();
/// log_op_end!("index_rebuild", started = started, node_count = 12);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, started = $started:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $crate::logging_facility::elapsed_ms(&$started),
            $($($field)*)?
        );
    };
}

/// Emit the `end_error` event of an operation started at `started`
///
/// The error is anything convertible into `ExError`; its kind and stable code
/// become the `err.kind` and `err.code` fields.
///
/// ```
/// # use arbor_core::{log_op_error, errors::ArborError};
/// let started = std::time::Instant::now();
/// log_op_error!("undo", ArborError::EmptyPath, started = started);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, started = $started:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $crate::logging_facility::elapsed_ms(&$started),
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            $($($field)*)?
        );
    }};
}

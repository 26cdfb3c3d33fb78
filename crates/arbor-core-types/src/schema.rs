//! Names shared by the core's structured log events
//!
//! Hosts that parse the JSON log stream, and tests that capture events, match
//! on these strings.

// Fields every op event carries
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Context
pub const FIELD_SESSION_ID: &str = "session_id";
pub const FIELD_STEP_ID: &str = "step_id";
pub const FIELD_SCOPE: &str = "scope";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Operations the core brackets with start/end events
pub const OP_INDEX_REBUILD: &str = "index_rebuild";
pub const OP_UNDO: &str = "undo";
pub const OP_REDO: &str = "redo";
pub const OP_ADD_STEP: &str = "add_step";
pub const OP_COLLECT_GARBAGE: &str = "collect_garbage";

// Values of the `scope` field on index rebuilds
pub const SCOPE_FULL: &str = "full";
pub const SCOPE_SCOPED: &str = "scoped";

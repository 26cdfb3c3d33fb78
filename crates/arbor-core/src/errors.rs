use arbor_core_types::SessionId;
use thiserror::Error;

/// Result type alias using ArborError
pub type Result<T> = std::result::Result<T, ArborError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every `ArborError` maps onto one of these kinds. Each kind carries a
/// stable code for programmatic handling and log assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // Addressing
    InvalidPath,
    NotFound,
    StaleHandle,

    // Structure
    SlotMismatch,
    StructuralInconsistency,
    AccessFailure,

    // History
    SerializationFailure,
    OperationPrecondition,
    DisciplineMismatch,

    // Configuration
    InvalidConfig,

    // Internal
    Internal,
}

impl ErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidPath => "ERR_INVALID_PATH",
            ErrorKind::NotFound => "ERR_NOT_FOUND",
            ErrorKind::StaleHandle => "ERR_STALE_HANDLE",
            ErrorKind::SlotMismatch => "ERR_SLOT_MISMATCH",
            ErrorKind::StructuralInconsistency => "ERR_STRUCTURAL_INCONSISTENCY",
            ErrorKind::AccessFailure => "ERR_ACCESS_FAILURE",
            ErrorKind::SerializationFailure => "ERR_SERIALIZATION_FAILURE",
            ErrorKind::OperationPrecondition => "ERR_OPERATION_PRECONDITION",
            ErrorKind::DisciplineMismatch => "ERR_DISCIPLINE_MISMATCH",
            ErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries the classification of an error together with the context a host
/// needs to report it: the operation, the node handle and path involved, and
/// the editing session.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ErrorKind,
    op: Option<String>,
    node_id: Option<String>,
    path: Option<String>,
    session_id: Option<SessionId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            op: None,
            node_id: None,
            path: None,
            session_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add node handle context
    pub fn with_node_id(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    /// Add address path context
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add session context
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the node handle context, if any
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    /// Get the path context, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Get the session context, if any
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(node_id) = &self.node_id {
            write!(f, " (node_id: {})", node_id)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for arbor operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArborError {
    // ===== Addressing Errors =====
    /// Path text could not be parsed
    #[error("Invalid path '{input}' at offset {offset}: {reason}")]
    PathParse {
        input: String,
        offset: usize,
        reason: String,
    },

    /// Path does not lead anywhere in the current document
    #[error("Path {path} does not resolve: {reason}")]
    PathUnresolved { path: String, reason: String },

    /// Operation requires a non-empty path
    #[error("Operation requires a non-empty path")]
    EmptyPath,

    /// Node handle was never issued by this document
    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    /// Node handle refers to a freed or reused arena slot
    #[error("Stale node handle: {node_id}")]
    StaleHandle { node_id: String },

    // ===== Structural Errors =====
    /// A member holds a value of the wrong shape for the requested access
    #[error("Slot mismatch at {path}: expected {expected}, found {found}")]
    SlotMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// Single-slot insertion target already holds a node
    #[error("Insert target {path} is already occupied")]
    InsertTargetOccupied { path: String },

    /// Collection index outside the valid range
    #[error("Index {index} out of range at {path} (len {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    /// Node is already attached somewhere in the forest
    #[error("Node {node_id} is already attached at {path}")]
    NodeAlreadyAttached { node_id: String, path: String },

    /// Path resolves to a different node than the one expected
    #[error("Expected node {expected} at {path}, found {found}")]
    NodeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// Edge is not present in the document
    #[error("Edge not found: {edge}")]
    EdgeNotFound { edge: String },

    // ===== History Errors =====
    /// Operation cannot be applied in the current document state
    #[error("Precondition failed for {op}: {reason}")]
    PreconditionFailed { op: String, reason: String },

    /// Replaying a step failed; the document was left untouched
    #[error("Replay of step {step_id} failed: {reason}")]
    ReplayFailed { step_id: String, reason: String },

    /// Snapshot payload does not match its recorded digest
    #[error("Snapshot digest mismatch: expected {expected}, got {actual}")]
    SnapshotDigestMismatch { expected: String, actual: String },

    /// Recording API does not match the configured history discipline
    #[error("History discipline is {configured}, cannot record {attempted}")]
    DisciplineMismatch {
        configured: String,
        attempted: String,
    },

    // ===== Configuration Errors =====
    /// Configuration failed to parse or validate
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // ===== Generic Errors =====
    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<serde_json::Error> for ArborError {
    fn from(err: serde_json::Error) -> Self {
        ArborError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ArborError {
    fn from(err: toml::de::Error) -> Self {
        ArborError::InvalidConfig {
            reason: err.to_string(),
        }
    }
}

impl ArborError {
    /// Canonical kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArborError::PathParse { .. } | ArborError::EmptyPath => ErrorKind::InvalidPath,
            ArborError::PathUnresolved { .. }
            | ArborError::NodeNotFound { .. }
            | ArborError::EdgeNotFound { .. } => ErrorKind::NotFound,
            ArborError::StaleHandle { .. } => ErrorKind::StaleHandle,
            ArborError::SlotMismatch { .. }
            | ArborError::InsertTargetOccupied { .. }
            | ArborError::IndexOutOfRange { .. } => ErrorKind::SlotMismatch,
            ArborError::NodeAlreadyAttached { .. } | ArborError::NodeMismatch { .. } => {
                ErrorKind::StructuralInconsistency
            }
            ArborError::PreconditionFailed { .. } => ErrorKind::OperationPrecondition,
            ArborError::ReplayFailed { .. }
            | ArborError::SnapshotDigestMismatch { .. }
            | ArborError::Serialization { .. } => ErrorKind::SerializationFailure,
            ArborError::DisciplineMismatch { .. } => ErrorKind::DisciplineMismatch,
            ArborError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            ArborError::Internal { .. } => ErrorKind::Internal,
        }
    }
}

/// Conversion from ArborError to ExError
///
/// Lifts the typed error into the structured facility, moving node handles
/// and paths into their dedicated context fields.
impl From<ArborError> for ExError {
    fn from(err: ArborError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let base = ExError::new(kind).with_message(message);

        match err {
            ArborError::PathParse { input, .. } => base.with_path(input),
            ArborError::PathUnresolved { path, .. }
            | ArborError::SlotMismatch { path, .. }
            | ArborError::InsertTargetOccupied { path }
            | ArborError::IndexOutOfRange { path, .. } => base.with_path(path),
            ArborError::NodeNotFound { node_id } | ArborError::StaleHandle { node_id } => {
                base.with_node_id(node_id)
            }
            ArborError::NodeAlreadyAttached { node_id, path } => {
                base.with_node_id(node_id).with_path(path)
            }
            ArborError::NodeMismatch { path, expected, .. } => {
                base.with_node_id(expected).with_path(path)
            }
            ArborError::PreconditionFailed { op, .. } => base.with_op(op),
            ArborError::ReplayFailed { .. } => base.with_op("replay"),
            ArborError::EmptyPath
            | ArborError::EdgeNotFound { .. }
            | ArborError::SnapshotDigestMismatch { .. }
            | ArborError::DisciplineMismatch { .. }
            | ArborError::InvalidConfig { .. }
            | ArborError::Serialization { .. }
            | ArborError::Internal { .. } => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_are_prefixed() {
        let kinds = [
            ErrorKind::InvalidPath,
            ErrorKind::NotFound,
            ErrorKind::StaleHandle,
            ErrorKind::SlotMismatch,
            ErrorKind::StructuralInconsistency,
            ErrorKind::AccessFailure,
            ErrorKind::SerializationFailure,
            ErrorKind::OperationPrecondition,
            ErrorKind::DisciplineMismatch,
            ErrorKind::InvalidConfig,
            ErrorKind::Internal,
        ];
        for kind in kinds {
            assert!(kind.code().starts_with("ERR_"));
        }
    }

    #[test]
    fn test_stale_handle_conversion_keeps_node_id() {
        let err = ArborError::StaleHandle {
            node_id: "n3v1".to_string(),
        };
        let ex: ExError = err.into();

        assert_eq!(ex.kind(), ErrorKind::StaleHandle);
        assert_eq!(ex.node_id(), Some("n3v1"));
        assert!(ex.to_string().starts_with("[ERR_STALE_HANDLE]"));
    }

    #[test]
    fn test_serde_json_error_maps_to_serialization_failure() {
        let err: ArborError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::SerializationFailure);
    }

    #[test]
    fn test_source_chain() {
        let inner = ExError::new(ErrorKind::NotFound).with_message("inner");
        let outer = ExError::new(ErrorKind::Internal).with_source(inner);

        assert_eq!(
            outer.source_error().map(|e| e.kind()),
            Some(ErrorKind::NotFound)
        );
        assert!(std::error::Error::source(&outer).is_some());
    }
}

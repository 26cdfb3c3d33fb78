//! Error Facility Tests
//!
//! ## Scenarios Covered
//!
//! 1. Every error variant maps to a stable kind and code
//! 2. Conversion into ExError moves handles and paths into context fields
//! 3. Display leads with the code
//! 4. Errors raised by the session carry the expected kind

mod common;

use arbor_core::{ArborError, ErrorKind, ExError, NodePath};
use common::{new_session, note};

#[test]
fn test_error_kind_code_mapping() {
    let kinds = vec![
        (ErrorKind::InvalidPath, "ERR_INVALID_PATH"),
        (ErrorKind::NotFound, "ERR_NOT_FOUND"),
        (ErrorKind::StaleHandle, "ERR_STALE_HANDLE"),
        (ErrorKind::SlotMismatch, "ERR_SLOT_MISMATCH"),
        (ErrorKind::StructuralInconsistency, "ERR_STRUCTURAL_INCONSISTENCY"),
        (ErrorKind::AccessFailure, "ERR_ACCESS_FAILURE"),
        (ErrorKind::SerializationFailure, "ERR_SERIALIZATION_FAILURE"),
        (ErrorKind::OperationPrecondition, "ERR_OPERATION_PRECONDITION"),
        (ErrorKind::DisciplineMismatch, "ERR_DISCIPLINE_MISMATCH"),
        (ErrorKind::InvalidConfig, "ERR_INVALID_CONFIG"),
        (ErrorKind::Internal, "ERR_INTERNAL"),
    ];

    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
    }
}

#[test]
fn test_variant_kinds() {
    let cases = vec![
        (ArborError::EmptyPath, ErrorKind::InvalidPath),
        (
            ArborError::EdgeNotFound {
                edge: "n0v0.out -> n1v0.in".to_string(),
            },
            ErrorKind::NotFound,
        ),
        (
            ArborError::IndexOutOfRange {
                path: "[0].Items".to_string(),
                index: 4,
                len: 2,
            },
            ErrorKind::SlotMismatch,
        ),
        (
            ArborError::InsertTargetOccupied {
                path: "[0].Header".to_string(),
            },
            ErrorKind::SlotMismatch,
        ),
        (
            ArborError::NodeMismatch {
                path: "[1]".to_string(),
                expected: "n2v0".to_string(),
                found: "n3v0".to_string(),
            },
            ErrorKind::StructuralInconsistency,
        ),
        (
            ArborError::ReplayFailed {
                step_id: "s1".to_string(),
                reason: "boom".to_string(),
            },
            ErrorKind::SerializationFailure,
        ),
        (
            ArborError::PreconditionFailed {
                op: "node_delete".to_string(),
                reason: "no node at [3]".to_string(),
            },
            ErrorKind::OperationPrecondition,
        ),
    ];

    for (err, kind) in cases {
        assert_eq!(err.kind(), kind, "{err}");
    }
}

#[test]
fn test_not_found_conversion_keeps_node_id() {
    let err = ArborError::NodeNotFound {
        node_id: "n9v0".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ErrorKind::NotFound);
    assert_eq!(ex_err.code(), "ERR_NOT_FOUND");
    assert_eq!(ex_err.node_id(), Some("n9v0"));
    assert_eq!(ex_err.path(), None);
}

#[test]
fn test_already_attached_carries_node_and_path() {
    let err = ArborError::NodeAlreadyAttached {
        node_id: "n1v0".to_string(),
        path: "[0].Items[1]".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ErrorKind::StructuralInconsistency);
    assert_eq!(ex_err.node_id(), Some("n1v0"));
    assert_eq!(ex_err.path(), Some("[0].Items[1]"));
    assert!(ex_err.message().contains("already attached"));
}

#[test]
fn test_precondition_failure_names_operation() {
    let err = ArborError::PreconditionFailed {
        op: "field_modify".to_string(),
        reason: "node is gone".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.op(), Some("field_modify"));
    let text = ex_err.to_string();
    assert!(text.starts_with("[ERR_OPERATION_PRECONDITION] in operation 'field_modify'"));
    assert!(text.contains("node is gone"));
}

#[test]
fn test_display_includes_context() {
    let ex_err = ExError::new(ErrorKind::SlotMismatch)
        .with_message("expected list")
        .with_path("[0].Items");

    assert_eq!(
        ex_err.to_string(),
        "[ERR_SLOT_MISMATCH]: expected list (path: [0].Items)"
    );
}

#[test]
fn test_session_errors_carry_kinds() {
    let (mut session, _clock) = new_session();

    // GIVEN a path that was never valid
    let err = NodePath::parse("[0]..Name").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);

    // WHEN deleting from an empty forest
    let err = session.delete_node(&NodePath::root(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // WHEN inserting far past the end of the roots
    let node = session.create_node(note("x"));
    let err = session.insert_node(&NodePath::root(5), node).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SlotMismatch);
}

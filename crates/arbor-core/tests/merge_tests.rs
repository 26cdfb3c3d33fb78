//! Merge Coalescing Tests
//!
//! ## Scenarios Covered
//!
//! 1. A -> B then B -> A inside the window leaves no step
//! 2. A drag of many updates collapses to one step, earliest old to latest new
//! 3. A -> B -> C -> A cancels however many intermediates it passed through
//! 4. Each (node, member) pair merges separately
//! 5. The window restarts with every edit; poll before it elapses keeps waiting
//! 6. Non-mergeable edits, undo and save flush pending groups first
//! 7. Repeated non-mergeable operations are dropped inside the window, but
//!    create/delete/create is not collapsed

mod common;

use arbor_core::history::StepPayload;
use arbor_core::{
    Edit, EditSession, ManualClock, NodeId, NodePath, Operation, Position, RecordOutcome, Value,
    POSITION_MEMBER,
};
use common::{name_of, note, session_with_window};

const WINDOW: u64 = 250;

fn name() -> NodePath {
    NodePath::empty().field("Name")
}

fn rename(session: &mut EditSession, node: NodeId, value: &str) {
    session.set_member(node, &name(), Value::from(value)).unwrap();
}

fn setup() -> (EditSession, ManualClock, NodeId, usize) {
    let (mut session, clock) = session_with_window(WINDOW);
    let node = session.add_root(note("A")).unwrap();
    clock.advance(WINDOW * 2);
    session.poll();
    let depth = session.history().undo_depth();
    (session, clock, node, depth)
}

#[test]
fn test_round_trip_inside_window_leaves_no_step() {
    // GIVEN a node named A
    let (mut session, clock, node, depth) = setup();

    // WHEN it is renamed A -> B and back B -> A inside the window
    rename(&mut session, node, "B");
    clock.advance(50);
    rename(&mut session, node, "A");
    assert_eq!(session.history().pending_len(), 1);

    // THEN once the window elapses no step was committed
    clock.advance(WINDOW);
    assert_eq!(session.poll(), 0);
    assert_eq!(session.history().undo_depth(), depth);
    assert_eq!(session.history().pending_len(), 0);
    assert_eq!(name_of(session.document(), node), "A");
}

#[test]
fn test_drag_collapses_to_one_step() {
    // GIVEN a node at the origin
    let (mut session, clock, node, depth) = setup();
    let position = NodePath::empty().field(POSITION_MEMBER);
    session
        .set_member(node, &position, Position::new(0.0, 0.0).into())
        .unwrap();
    clock.advance(WINDOW * 2);
    session.poll();
    let depth = depth + 1;

    // WHEN it is dragged through ten positions, 16ms apart
    for i in 1..=10 {
        session
            .set_member(node, &position, Position::new(f64::from(i), 0.0).into())
            .unwrap();
        clock.advance(16);
    }
    clock.advance(WINDOW);
    assert_eq!(session.poll(), 1);

    // THEN one step records the whole gesture
    assert_eq!(session.history().undo_depth(), depth + 1);
    let step = session.history().steps().last().unwrap();
    match step.ops() {
        [op] => match &op.edit {
            Edit::FieldModify { old, new, .. } => {
                assert_eq!(Position::from_value(old), Some(Position::new(0.0, 0.0)));
                assert_eq!(Position::from_value(new), Some(Position::new(10.0, 0.0)));
            }
            other => panic!("unexpected edit {other:?}"),
        },
        ops => panic!("expected one operation, got {}", ops.len()),
    }

    // AND one undo returns to the origin
    session.undo().unwrap();
    let record = session.document().node(node).unwrap();
    assert_eq!(record.position(), Some(Position::new(0.0, 0.0)));
}

#[test]
fn test_multi_intermediate_cancel() {
    let (mut session, clock, node, depth) = setup();

    for value in ["B", "C", "D", "A"] {
        rename(&mut session, node, value);
        clock.advance(20);
    }
    clock.advance(WINDOW);
    session.poll();

    assert_eq!(session.history().undo_depth(), depth);
    assert_eq!(session.history().pending_len(), 0);
    assert_eq!(name_of(session.document(), node), "A");
}

#[test]
fn test_members_merge_separately() {
    // GIVEN edits to two members of the same node
    let (mut session, clock, node, depth) = setup();
    let colour = NodePath::empty().field("Colour");

    rename(&mut session, node, "B");
    session.set_member(node, &colour, Value::from("red")).unwrap();
    rename(&mut session, node, "C");
    session.set_member(node, &colour, Value::from("blue")).unwrap();

    // WHEN the window elapses
    clock.advance(WINDOW);
    assert_eq!(session.poll(), 2);

    // THEN each member produced its own step, in first-arrival order
    assert_eq!(session.history().undo_depth(), depth + 2);
    let members: Vec<String> = session
        .history()
        .steps()
        .skip(depth)
        .map(|s| match &s.ops()[0].edit {
            Edit::FieldModify { member, .. } => member.to_string(),
            other => panic!("unexpected edit {other:?}"),
        })
        .collect();
    assert_eq!(members, vec!["Name", "Colour"]);
}

#[test]
fn test_window_restarts_with_each_edit() {
    let (mut session, clock, node, depth) = setup();

    // edits 200ms apart never let the 250ms window elapse
    for value in ["B", "C", "D"] {
        rename(&mut session, node, value);
        clock.advance(200);
        assert_eq!(session.poll(), 0);
    }
    assert_eq!(session.history().pending_len(), 1);

    clock.advance(WINDOW);
    assert_eq!(session.poll(), 1);
    assert_eq!(session.history().undo_depth(), depth + 1);
}

#[test]
fn test_structural_edit_flushes_pending_first() {
    // GIVEN a pending rename
    let (mut session, _clock, node, depth) = setup();
    rename(&mut session, node, "B");

    // WHEN a node is added before the window elapses
    session.add_root(note("second")).unwrap();

    // THEN the rename committed first, then the insert
    let kinds: Vec<&str> = session
        .history()
        .steps()
        .skip(depth)
        .map(|s| s.ops()[0].kind().as_str())
        .collect();
    assert_eq!(kinds, vec!["field_modify", "node_create"]);
    assert_eq!(session.history().pending_len(), 0);
}

#[test]
fn test_undo_flushes_pending_group() {
    let (mut session, _clock, node, _) = setup();
    rename(&mut session, node, "B");
    rename(&mut session, node, "C");

    // undo right away: the group commits, then reverts
    assert!(session.undo().unwrap());
    assert_eq!(name_of(session.document(), node), "A");
    assert!(session.redo().unwrap());
    assert_eq!(name_of(session.document(), node), "C");
}

#[test]
fn test_mark_saved_flushes_pending() {
    let (mut session, _clock, node, _) = setup();
    rename(&mut session, node, "B");
    assert!(session.is_modified());

    session.mark_saved();

    assert!(!session.is_modified());
    assert_eq!(session.history().pending_len(), 0);
}

#[test]
fn test_duplicate_operation_dropped_in_window() {
    // GIVEN a collaborator that attaches a node itself
    let (mut session, clock, _, depth) = setup();
    let node = session.create_node(note("x"));
    let at = NodePath::root(1);
    session.document_mut().insert_node(&at, node).unwrap();
    let op = Operation::new(
        Edit::NodeCreate {
            node,
            at: at.clone(),
        },
        session.now_ms(),
    );

    // WHEN it reports the same operation twice inside the window
    let first = session.record_operation(op.clone()).unwrap();
    let second = session.record_operation(op.clone()).unwrap();

    // THEN only the first becomes a step
    assert_eq!(first, RecordOutcome::Committed);
    assert_eq!(second, RecordOutcome::Duplicate);
    assert_eq!(session.history().undo_depth(), depth + 1);

    // AND once the window has passed it counts again
    clock.advance(WINDOW + 1);
    let later = Operation::new(op.edit.clone(), session.now_ms());
    assert_eq!(session.record_operation(later).unwrap(), RecordOutcome::Committed);
}

#[test]
fn test_create_delete_create_not_collapsed() {
    // GIVEN a node inserted, deleted and inserted again in quick succession
    let (mut session, _clock, _, depth) = setup();
    let node = session.create_node(note("x"));
    let at = NodePath::root(1);
    session.insert_node(&at, node).unwrap();
    session.delete_node(&at).unwrap();
    session.insert_node(&at, node).unwrap();

    // THEN all three were recorded
    assert_eq!(session.history().undo_depth(), depth + 3);
    for _ in 0..3 {
        session.undo().unwrap();
    }
    assert_eq!(session.node_by_path(&at), None);
}

#[test]
fn test_zero_window_commits_every_edit() {
    let (mut session, _clock) = session_with_window(0);
    let node = session.add_root(note("A")).unwrap();
    rename(&mut session, node, "B");
    rename(&mut session, node, "A");

    assert_eq!(session.history().undo_depth(), 3);
    assert_eq!(session.history().pending_len(), 0);
    let step = session.history().steps().last().unwrap();
    assert!(matches!(step.payload, StepPayload::Operations(_)));
}

//! Tree Validation Tests
//!
//! ## Scenarios Covered
//!
//! 1. A healthy tree reports a one-line OK summary
//! 2. Cycles, shared references and access failures are listed
//! 3. A stale index reports broken links and orphans
//! 4. A dirty index says so
//! 5. Validation never mutates and never fails

mod common;

use std::collections::HashSet;

use arbor_core::{NodePath, TreeIndex, Value};
use common::{board_with_cards, document_with_cards, new_session, note, test_registry};

#[test]
fn test_healthy_session_reports_ok() {
    // GIVEN a board with two cards and a second root
    let (mut session, _clock) = new_session();
    board_with_cards(&mut session, &["a", "b"]);
    session.add_root(note("loose")).unwrap();

    // WHEN validating
    let report = session.validate_tree();

    // THEN the summary counts nodes and roots
    assert_eq!(report, "OK: 4 nodes, 2 roots");
}

#[test]
fn test_empty_document_is_ok() {
    let (mut session, _clock) = new_session();
    assert_eq!(session.validate_tree(), "OK: 0 nodes, 0 roots");
}

#[test]
fn test_cycle_shared_and_access_failures_listed() {
    // GIVEN a card that lists itself, a note listed twice and a bad member
    let (mut session, _clock) = new_session();
    let (_, cards) = board_with_cards(&mut session, &["a", "b"]);
    let shared = session.create_node(note("shared"));
    let items = NodePath::empty().field("Items");
    session
        .set_member(cards[0], &items, Value::nodes([cards[0], shared]))
        .unwrap();
    session
        .set_member(cards[1], &items, Value::List(vec![Value::Node(shared), Value::from("junk")]))
        .unwrap();

    // WHEN validating
    let report = session.validate_tree();

    // THEN every finding has its own line
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "3 issue(s) found");
    assert!(lines.iter().any(|l| l.starts_with("CYCLE") && l.contains("[0].Items[0].Items[0]")));
    assert!(lines.iter().any(|l| l.starts_with("SHARED") && l.contains("[0].Items[1].Items[0]")));
    assert!(lines.iter().any(|l| l.starts_with("ACCESS") && l.contains("Items[1]")));

    // AND the walk still indexed the shared note once, at its first path
    assert_eq!(
        session.metadata(shared).unwrap().path.to_string(),
        "[0].Items[0].Items[1]"
    );
}

#[test]
fn test_stale_index_reports_links_and_orphans() {
    // GIVEN a clean standalone index over a board with two cards
    let (mut doc, _, cards) = document_with_cards(&["a", "b"]);
    let registry = test_registry();
    let mut index = TreeIndex::default();
    index.ensure_clean(&doc, &registry);

    // WHEN the first card is detached and purged behind the index's back
    let removed = doc.detach_node(&NodePath::parse("[0].Items[0]").unwrap()).unwrap();
    assert_eq!(removed, cards[0]);
    assert_eq!(doc.purge_unreachable(&HashSet::new()), 1);

    // THEN validation names the dead entry and the shifted survivor
    let report = index.validate(&doc);
    assert!(!report.starts_with("OK"), "{report}");
    assert!(report.contains(&format!("ORPHAN {} at [0].Items[0]", cards[0])));
    assert!(report.contains(&format!("LINK {} path [0].Items[1] no longer resolves", cards[1])));

    // AND a rebuild clears every finding
    index.mark_dirty();
    index.ensure_clean(&doc, &registry);
    assert_eq!(index.validate(&doc), "OK: 2 nodes, 1 roots");
}

#[test]
fn test_dirty_index_reports_state() {
    let (doc, _, _) = document_with_cards(&["a"]);
    let registry = test_registry();
    let mut index = TreeIndex::new(true);
    index.ensure_clean(&doc, &registry);
    index.mark_dirty();

    let report = index.validate(&doc);
    assert_eq!(report.lines().next(), Some("1 issue(s) found"));
    assert!(report.contains("STATE index is dirty"));
}

#[test]
fn test_validation_leaves_document_untouched() {
    let (mut session, _clock) = new_session();
    let (_, cards) = board_with_cards(&mut session, &["a"]);
    session
        .set_member(cards[0], &NodePath::empty().field("Items"), Value::from("broken"))
        .unwrap();
    let before = session.document().clone();

    let report = session.validate_tree();

    assert!(report.contains("ACCESS"));
    assert_eq!(session.document(), &before);
    assert_eq!(
        session.document().node(cards[0]).unwrap().get("Items"),
        Some(&Value::from("broken"))
    );
}

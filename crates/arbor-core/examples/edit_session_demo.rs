#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Edit Session Demonstration
//!
//! Drives one editing session end to end.
//!
//! Key concepts illustrated:
//! 1. Declaring child slots per node type
//! 2. Path addressing and index queries
//! 3. Merge coalescing of a drag gesture
//! 4. Batched edits undoing as one step
//! 5. Undo/redo and tree validation

use arbor_core::{
    logging_facility::{init, Profile},
    EditSession, ManualClock, NodePath, NodeRecord, Position, SchemaRegistry, SessionConfig,
    TypeDescriptor, Value, POSITION_MEMBER,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init(Profile::Development);
    println!("=== Arbor Edit Session Demo ===\n");

    // ===== Part 1: Schema and Session =====
    println!("## Part 1: Schema\n");

    let mut registry = SchemaRegistry::new();
    registry.register(
        TypeDescriptor::new("Board")
            .single("Header", 0)
            .collection("Items", 1),
    )?;
    registry.register(TypeDescriptor::new("Card").collection("Items", 0))?;
    println!("Registered {} types", registry.warm());

    let config = SessionConfig::from_toml_str(
        r#"
        [history]
        max_steps = 50
        merge_window_ms = 200
        "#,
    )?;
    let clock = ManualClock::new(0);
    let mut session = EditSession::new(registry, config)?.with_clock(clock.clone());

    // ===== Part 2: Building a Tree =====
    println!("\n## Part 2: Tree\n");

    let board = session.add_root(NodeRecord::new("Board").with("Items", Value::List(Vec::new())))?;
    for name in ["todo", "doing", "done"] {
        let card = session.create_node(NodeRecord::new("Card").with("Name", name).at(0.0, 0.0));
        let len = session.children(board).len();
        session.insert_node(&NodePath::root(0).field("Items").index(len), card)?;
        clock.advance(10);
    }
    for node in session.sorted_nodes().to_vec() {
        let meta = session.metadata(node).unwrap();
        println!("{:<16} depth {}", meta.path.to_string(), meta.depth);
    }

    // ===== Part 3: Drag Gesture =====
    println!("\n## Part 3: Drag\n");

    let doing = session
        .node_by_path(&NodePath::parse("[0].Items[1]")?)
        .unwrap();
    let position = NodePath::empty().field(POSITION_MEMBER);
    let steps_before = session.history().undo_depth();
    for x in [10.0, 20.0, 30.0] {
        session.set_member(doing, &position, Position::new(x, 5.0).into())?;
        clock.advance(16);
    }
    clock.advance(500);
    session.poll();
    println!(
        "3 drag updates became {} step(s)",
        session.history().undo_depth() - steps_before
    );

    // ===== Part 4: Batch =====
    println!("\n## Part 4: Batch\n");

    session.begin_batch("clear board")?;
    session.delete_node(&NodePath::parse("[0].Items[2]")?)?;
    session.delete_node(&NodePath::parse("[0].Items[0]")?)?;
    session.end_batch();
    println!("Cards left: {}", session.children(board).len());

    // ===== Part 5: Undo / Redo =====
    println!("\n## Part 5: Undo\n");

    session.undo()?;
    println!("After undo: {} cards", session.children(board).len());
    session.redo()?;
    println!("After redo: {} cards", session.children(board).len());
    println!("Validation: {}", session.validate_tree());

    let freed = session.collect_garbage();
    println!("Garbage collected: {freed} node(s) (history still references the rest)");
    println!("Events: {}", session.drain_events().len());

    Ok(())
}

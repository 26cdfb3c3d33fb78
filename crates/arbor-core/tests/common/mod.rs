use arbor_core::{
    Document, EditSession, ManualClock, NodeId, NodePath, NodeRecord, SchemaRegistry,
    SessionConfig, SlotDescriptor, TypeDescriptor, Value,
};

/// Registry used across the integration tests
///
/// - `Board`: single `Header` (priority 0), collection `Items` (priority 1)
/// - `Card`: collection `Items`
/// - `Frame`: nested slot `Body.Content` (priority 0), collection `Items` (priority 1)
/// - `Note`: leaf
#[allow(dead_code)]
pub fn test_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            TypeDescriptor::new("Board")
                .single("Header", 0)
                .collection("Items", 1),
        )
        .unwrap();
    registry
        .register(TypeDescriptor::new("Card").collection("Items", 0))
        .unwrap();
    registry
        .register(
            TypeDescriptor::new("Frame")
                .slot(SlotDescriptor::single("Body").nested(["Content"]))
                .collection("Items", 1),
        )
        .unwrap();
    registry.register(TypeDescriptor::new("Note")).unwrap();
    registry
}

/// A record with an empty `Items` list, ready to take children
#[allow(dead_code)]
pub fn container(type_name: &str, name: &str) -> NodeRecord {
    NodeRecord::new(type_name)
        .with("Name", name)
        .with("Items", Value::List(Vec::new()))
}

#[allow(dead_code)]
pub fn note(name: &str) -> NodeRecord {
    NodeRecord::new("Note").with("Name", name)
}

/// Path of the `index`-th entry in the `Items` list under `parent`
#[allow(dead_code)]
pub fn item(parent: &NodePath, index: usize) -> NodePath {
    parent.clone().field("Items").index(index)
}

/// Session with merging disabled, driven by a manual clock
#[allow(dead_code)]
pub fn new_session() -> (EditSession, ManualClock) {
    session_with(SessionConfig::default(), 0)
}

/// Session with the given merge window, driven by a manual clock
#[allow(dead_code)]
pub fn session_with_window(merge_window_ms: u64) -> (EditSession, ManualClock) {
    session_with(SessionConfig::default(), merge_window_ms)
}

#[allow(dead_code)]
pub fn session_with(mut config: SessionConfig, merge_window_ms: u64) -> (EditSession, ManualClock) {
    config.history.merge_window_ms = merge_window_ms;
    let clock = ManualClock::new(1_000);
    let session = EditSession::new(test_registry(), config)
        .unwrap()
        .with_clock(clock.clone());
    (session, clock)
}

/// Append a child to the `Items` list of the node at `parent`
#[allow(dead_code)]
pub fn append(session: &mut EditSession, parent: &NodePath, record: NodeRecord) -> NodeId {
    let owner = session.node_by_path(parent).unwrap();
    let len = session.children(owner).len();
    let node = session.create_node(record);
    session.insert_node(&item(parent, len), node).unwrap();
    node
}

/// Board `[0]` with cards named by `names` in its `Items` list
#[allow(dead_code)]
pub fn board_with_cards(session: &mut EditSession, names: &[&str]) -> (NodeId, Vec<NodeId>) {
    let board = session.add_root(container("Board", "board")).unwrap();
    let root = NodePath::root(0);
    let cards = names
        .iter()
        .map(|name| append(session, &root, container("Card", name)))
        .collect();
    (board, cards)
}

/// Document with a board holding `names` cards, built without a session
#[allow(dead_code)]
pub fn document_with_cards(names: &[&str]) -> (Document, NodeId, Vec<NodeId>) {
    let mut doc = Document::new();
    let board = doc.create_node(container("Board", "board"));
    doc.insert_node(&NodePath::root(0), board).unwrap();
    let cards = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let card = doc.create_node(container("Card", name));
            doc.insert_node(&item(&NodePath::root(0), i), card).unwrap();
            card
        })
        .collect();
    (doc, board, cards)
}

/// `Name` member of a node as text
#[allow(dead_code)]
pub fn name_of(doc: &Document, node: NodeId) -> String {
    match doc.node(node).unwrap().get("Name") {
        Some(Value::Text(name)) => name.clone(),
        other => panic!("node {node} has no text name: {other:?}"),
    }
}

//! Address Path Tests
//!
//! ## Scenarios Covered
//!
//! 1. Text form of root, member, index and quoted segments
//! 2. Parse errors are typed and carry the failing offset
//! 3. Prefix, parent and combine algebra used by scoped invalidation
//! 4. Serde uses the text form
//! 5. Any path formats to text that parses back to the same path

use arbor_core::{ArborError, ErrorKind, NodePath, PathPart};
use proptest::prelude::*;

#[test]
fn test_format_root_member_index() {
    // GIVEN a path built segment by segment
    let path = NodePath::root(0).field("Items").index(2).field("Body");

    // THEN the text form follows the canonical grammar
    assert_eq!(path.to_string(), "[0].Items[2].Body");
    assert_eq!(path.depth(), 4);
    assert_eq!(path.root_index(), Some(0));
}

#[test]
fn test_parse_matches_builder() {
    let parsed: NodePath = "[3].Header.Items[10]".parse().unwrap();
    let built = NodePath::root(3).field("Header").field("Items").index(10);
    assert_eq!(parsed, built);
}

#[test]
fn test_non_identifier_fields_are_quoted() {
    // GIVEN field names that are not identifiers
    let path = NodePath::root(1).field("has space").field("9lives");

    // WHEN formatted
    let text = path.to_string();

    // THEN both are quoted and the text parses back
    assert_eq!(text, r#"[1]["has space"]["9lives"]"#);
    assert_eq!(NodePath::parse(&text).unwrap(), path);
}

#[test]
fn test_parse_errors_are_invalid_path() {
    for bad in ["[0", "[0]Items", "[0].", "[-1]", "[0].Items[]", "[0][\"x"] {
        let err = NodePath::parse(bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath, "input {bad:?}");
    }
}

#[test]
fn test_parse_error_offset_points_at_bad_byte() {
    match NodePath::parse("[0].Items[2]x") {
        Err(ArborError::PathParse { offset, input, .. }) => {
            assert_eq!(input, "[0].Items[2]x");
            assert_eq!(offset, 12);
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_prefix_algebra() {
    // GIVEN a parent and a descendant
    let parent = NodePath::parse("[0].Items[1]").unwrap();
    let child = NodePath::parse("[0].Items[1].Items[0]").unwrap();
    let sibling = NodePath::parse("[0].Items[10]").unwrap();

    // THEN prefix checks work per segment, not per character
    assert!(child.starts_with(&parent));
    assert!(!sibling.starts_with(&parent));
    assert!(child.is_child_of(&parent.clone().field("Items")));

    // AND parent/strip/combine are consistent
    let relative = child.strip_prefix(&parent).unwrap();
    assert_eq!(relative.to_string(), "Items[0]");
    assert_eq!(parent.combine(&relative), child);
    assert_eq!(child.parent().unwrap().parent(), Some(parent));
}

#[test]
fn test_ancestors_are_proper_prefixes() {
    let path = NodePath::parse("[0].Items[1].Header").unwrap();
    let ancestors: Vec<String> = path.ancestors().map(|p| p.to_string()).collect();
    assert!(!ancestors.is_empty());
    for text in &ancestors {
        let ancestor = NodePath::parse(text).unwrap();
        assert!(path.starts_with(&ancestor));
        assert!(ancestor.depth() < path.depth());
    }
}

#[test]
fn test_serde_uses_text_form() {
    let path = NodePath::parse("[0].Items[2]").unwrap();
    let json = serde_json::to_string(&path).unwrap();
    assert_eq!(json, "\"[0].Items[2]\"");
    let back: NodePath = serde_json::from_str(&json).unwrap();
    assert_eq!(back, path);

    assert!(serde_json::from_str::<NodePath>("\"[0].\"").is_err());
}

fn part_strategy() -> impl Strategy<Value = PathPart> {
    prop_oneof![
        any::<usize>().prop_map(PathPart::Index),
        "[A-Za-z_][A-Za-z0-9_]{0,8}".prop_map(PathPart::Field),
        "\\PC{0,6}".prop_map(PathPart::Field),
    ]
}

proptest! {
    #[test]
    fn prop_format_parse_round_trip(parts in prop::collection::vec(part_strategy(), 0..8)) {
        let path = NodePath::from_parts(parts);
        let text = path.to_string();
        let parsed = NodePath::parse(&text).unwrap();
        prop_assert_eq!(parsed, path);
    }
}

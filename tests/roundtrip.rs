//! The round-trip testable property from `spec.md` §8: a parsed tree,
//! written back with [`chiptune_score::parse::write_tree`], retokenized
//! and reparsed, produces an isomorphic tree.

use chiptune_score::lex::tokenize;
use chiptune_score::parse::{parse, write_tree, NodeKind};

fn roundtrip(source: &str) -> (chiptune_score::parse::Node, chiptune_score::parse::Node) {
    let tree = parse(&tokenize(source).unwrap().tokens).unwrap().tree;
    let mut written = String::new();
    write_tree(&tree, &mut written).expect("formatting to a String never fails");
    let reparsed = parse(&tokenize(&written).unwrap().tokens).unwrap().tree;
    (tree, reparsed)
}

#[test]
fn flat_commands_are_isomorphic_after_a_roundtrip() {
    let (original, reparsed) = roundtrip("v:128;a:c4;s:4;r");
    assert_eq!(original, reparsed);
}

#[test]
fn nested_groups_are_isomorphic_after_a_roundtrip() {
    let (original, reparsed) = roundtrip("[track:0; [grp:0; a:c4; s:1; x]; g:0]");
    assert_eq!(original, reparsed);
}

#[test]
fn strings_needing_escapes_survive_a_roundtrip() {
    let (original, reparsed) = roundtrip(r#"d:"has space and a \"quote\"";load:wav:"kick.wav""#);
    assert_eq!(original, reparsed);
}

#[test]
fn data_literals_survive_a_roundtrip() {
    let (original, reparsed) = roundtrip(r#"data:16sl:!"//4=""#);
    assert_eq!(original, reparsed);
}

#[test]
fn comments_are_preserved_across_a_roundtrip() {
    let (original, reparsed) = roundtrip("v:1 % hello world\na:c4");
    let has_comment = |tree: &chiptune_score::parse::Node| {
        tree.children()
            .iter()
            .any(|c| matches!(c.kind, NodeKind::Comment(_)))
    };
    assert!(has_comment(&original));
    assert!(has_comment(&reparsed));
    assert_eq!(original, reparsed);
}

#[test]
fn an_empty_source_roundtrips_to_an_empty_tree() {
    let (original, reparsed) = roundtrip("");
    assert_eq!(original, reparsed);
    assert!(original.children().is_empty());
}

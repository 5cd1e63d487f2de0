//! Deeper coverage of [`chiptune_score::compile::link`] than the unit
//! tests colocated with it: multiple unresolved jump sites accumulating
//! into one `Err`, and a global jump fired from an undefined group.

use chiptune_score::compile::{link, Compiler};
use chiptune_score::config::Config;
use chiptune_score::error::LinkError;
use chiptune_score::lex::tokenize;
use chiptune_score::parse::parse;

fn compile(source: &str) -> chiptune_score::compile::CompileOutput {
    let tokens = tokenize(source).unwrap().tokens;
    let tree = parse(&tokens).unwrap().tree;
    Compiler::new(Config::default()).compile(&tree).unwrap()
}

#[test]
fn unresolved_global_jump_from_a_track_errors() {
    let out = compile("[track; g:0g]");
    let errs = link(&out.tracks, &out.jump_sites).unwrap_err();
    assert_eq!(errs.len(), 1);
    assert!(matches!(errs[0], LinkError::GlobalGroupUndefined { index: 0, .. }));
}

#[test]
fn every_unresolved_jump_site_is_reported_not_just_the_first() {
    let out = compile("g:1; g:2; g:3");
    let errs = link(&out.tracks, &out.jump_sites).unwrap_err();
    assert_eq!(errs.len(), 3);
    for (err, expected) in errs.iter().zip([1, 2, 3]) {
        assert!(matches!(err, LinkError::LocalGroupUndefined { index, .. } if *index == expected));
    }
}

#[test]
fn a_mix_of_resolved_and_unresolved_sites_reports_only_the_unresolved_ones() {
    let out = compile("[grp:0; a:c4; s:1; x]; g:0; g:7");
    let errs = link(&out.tracks, &out.jump_sites).unwrap_err();
    assert_eq!(errs.len(), 1);
    assert!(matches!(errs[0], LinkError::LocalGroupUndefined { index: 7, .. }));
}

#[test]
fn track_group_undefined_names_the_missing_track_and_group() {
    let out = compile("g:2t5");
    let errs = link(&out.tracks, &out.jump_sites).unwrap_err();
    assert!(matches!(
        errs[0],
        LinkError::TrackGroupUndefined {
            track: 5,
            group: 2,
            ..
        }
    ));
}

#[test]
fn link_errors_render_a_human_readable_message() {
    let out = compile("g:9");
    let errs = link(&out.tracks, &out.jump_sites).unwrap_err();
    let message = errs[0].to_string();
    assert!(message.contains('9'));
}

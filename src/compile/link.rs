//! Validates every `g`-command call site against the finished symbol
//! tables.
//!
//! [`crate::compile::compiler::Instruction::Call`] already carries fully
//! resolved track/group indices (see `DESIGN.md`, "linking as validation,
//! not rewriting"): this pass decodes each recorded
//! [`crate::compile::compiler::JumpSite`] and checks that its target
//! actually exists, the way `BKTKCompilerLink` walks the finished track
//! table in the original implementation.

use super::compiler::JumpSite;
use super::instruction::{GroupScope, Instruction};
use super::model::CompiledTrack;
use super::slots::SparseSlots;
use crate::error::LinkError;

/// Checks every recorded [`JumpSite`] against `tracks`, collecting every
/// unresolved target rather than stopping at the first one.
///
/// # Errors
///
/// Returns every [`LinkError`] found, in the order the call sites were
/// compiled. An empty `Err` never occurs; a fully resolved score returns
/// `Ok(())`.
pub fn link(tracks: &SparseSlots<CompiledTrack>, jump_sites: &[JumpSite]) -> Result<(), Vec<LinkError>> {
    let mut errors = Vec::new();
    for site in jump_sites {
        if let Err(err) = check_site(tracks, site) {
            errors.push(err);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_site(tracks: &SparseSlots<CompiledTrack>, site: &JumpSite) -> Result<(), LinkError> {
    let home_track = tracks
        .get(site.home_track)
        .expect("home track of a recorded jump site always exists");
    let code = match site.home_group {
        Some(group) => {
            &home_track
                .groups
                .get(group)
                .expect("home group of a recorded jump site always exists")
                .code
                .0
        }
        None => &home_track.code.0,
    };
    let (instr, _) = Instruction::decode(&code[site.offset..]);
    let Instruction::Call {
        scope,
        track,
        group,
    } = instr
    else {
        unreachable!("a recorded jump site always points at a Call instruction")
    };

    match scope {
        GroupScope::Local => {
            if !home_track.groups.contains(group as u32) {
                return Err(LinkError::LocalGroupUndefined {
                    index: group as u32,
                    position: site.position,
                });
            }
        }
        GroupScope::Global => {
            let global = tracks.get(0).expect("track 0 always exists");
            if !global.groups.contains(group as u32) {
                return Err(LinkError::GlobalGroupUndefined {
                    index: group as u32,
                    position: site.position,
                });
            }
        }
        GroupScope::Track => {
            let target_track = tracks.get(track as u32);
            let resolved = target_track.is_some_and(|t| t.groups.contains(group as u32));
            if !resolved {
                return Err(LinkError::TrackGroupUndefined {
                    track: track as u32,
                    group: group as u32,
                    position: site.position,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compiler::Compiler;
    use crate::config::Config;
    use crate::lex::tokenize;
    use crate::parse::parse;

    fn compile(source: &str) -> (SparseSlots<CompiledTrack>, Vec<JumpSite>) {
        let tokens = tokenize(source).unwrap().tokens;
        let tree = parse(&tokens).unwrap().tree;
        let out = Compiler::new(Config::default()).compile(&tree).unwrap();
        (out.tracks, out.jump_sites)
    }

    #[test]
    fn resolved_local_jump_links_cleanly() {
        let (tracks, sites) = compile("[grp:0; a:c4; s:1; x]; g:0");
        assert!(link(&tracks, &sites).is_ok());
    }

    #[test]
    fn unresolved_local_jump_errors() {
        let (tracks, sites) = compile("g:5");
        let errs = link(&tracks, &sites).unwrap_err();
        assert!(matches!(errs[0], LinkError::LocalGroupUndefined { index: 5, .. }));
    }

    #[test]
    fn unresolved_track_jump_errors() {
        let (tracks, sites) = compile("g:0t9");
        let errs = link(&tracks, &sites).unwrap_err();
        assert!(matches!(
            errs[0],
            LinkError::TrackGroupUndefined {
                track: 9,
                group: 0,
                ..
            }
        ));
    }

    #[test]
    fn resolved_global_jump_from_inside_a_track_links_cleanly() {
        let (tracks, sites) = compile("[grp:0; a:c4; s:1; x]; [track; g:0g]");
        assert!(link(&tracks, &sites).is_ok());
    }
}

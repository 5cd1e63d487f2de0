//! Top-level, one-call entry points that drive the whole front end.
//!
//! Mirrors the teacher's `bms::parse_bms` / `Bms::from_token_stream`
//! convenience layer: most callers don't want to hand-wire a
//! [`crate::lex::Tokenizer`] to a [`crate::parse::Parser`] to a
//! [`crate::compile::Compiler`] to [`crate::compile::link`] themselves, so
//! [`Score::compile_str`] and [`Score::compile_str_with_config`] do it in
//! one step and collect every warning along the way into a single
//! [`CompileOutcome`], the same `{result, warnings}` shape as the teacher's
//! `BmsOutput`.

use crate::compile::{CompileOutput, Compiler};
use crate::config::Config;
use crate::error::{ScoreError, Warning};
use crate::lex::tokenize;
use crate::parse::parse;

/// A fully compiled and linked score: resolved resource tables plus every
/// track's bytecode, ready to hand to a [`crate::context::Context`].
pub struct Score {
    /// The compiler's output: tracks, instruments, waveforms, samples.
    pub output: CompileOutput,
}

impl Score {
    /// The number of declared tracks, including the implicit global track 0.
    #[must_use]
    pub fn tracks(&self) -> &crate::compile::slots::SparseSlots<crate::compile::model::CompiledTrack> {
        &self.output.tracks
    }
}

/// The result of [`Score::compile_str`]: either a ready-to-run [`Score`]
/// plus any warnings, or the accumulated errors that stopped compilation.
///
/// Mirrors the teacher's `BmsOutput { bms, parse_warnings, ast_warnings }`
/// shape: a caller inspects `errors` first, and only trusts `score` once
/// it is empty.
#[derive(Default)]
pub struct CompileOutcome {
    /// The compiled score, present only if every stage succeeded.
    pub score: Option<Score>,
    /// Every fatal error encountered, in pipeline order (lex, then parse,
    /// then compile, then link). Compilation stops at the first fatal
    /// error within a stage, but a failed link pass reports every
    /// unresolved call site it finds.
    pub errors: Vec<ScoreError>,
    /// Every non-fatal diagnostic accumulated across every stage.
    pub warnings: Vec<Warning>,
}

impl Score {
    /// Tokenizes, parses, compiles and links `source` in one step, using
    /// [`Config::default`].
    ///
    /// # Errors
    ///
    /// Never returns `Err`; use [`CompileOutcome::errors`] instead; this
    /// mirrors the teacher's `parse_bms`, which also returns a plain
    /// output struct rather than a `Result`; the panic-free return value
    /// lets a caller render every collected error without recompiling.
    #[must_use]
    pub fn compile_str(source: &str) -> CompileOutcome {
        Self::compile_str_with_config(source, Config::default())
    }

    /// As [`Self::compile_str`], with an explicit [`Config`] overriding the
    /// default step-ticks, tick-rate, timing mode and track/group ceilings.
    #[must_use]
    pub fn compile_str_with_config(source: &str, config: Config) -> CompileOutcome {
        let mut outcome = CompileOutcome::default();

        let lexed = match tokenize(source) {
            Ok(lexed) => lexed,
            Err(err) => {
                outcome.errors.push(ScoreError::from(err));
                return outcome;
            }
        };
        outcome
            .warnings
            .extend(lexed.warnings.into_iter().map(Warning::from));

        let parsed = match parse(&lexed.tokens) {
            Ok(parsed) => parsed,
            Err(err) => {
                outcome.errors.push(ScoreError::from(err));
                return outcome;
            }
        };

        let compiled = match Compiler::new(config).compile(&parsed.tree) {
            Ok(compiled) => compiled,
            Err(err) => {
                outcome.errors.push(ScoreError::from(err));
                return outcome;
            }
        };
        outcome.warnings.extend(compiled.warnings.clone());

        if let Err(link_errors) = crate::compile::link(&compiled.tracks, &compiled.jump_sites) {
            outcome
                .errors
                .extend(link_errors.into_iter().map(ScoreError::from));
            return outcome;
        }

        outcome.score = Some(Score { output: compiled });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_links_a_minimal_score() {
        let outcome = Score::compile_str("v:128;a:c4;s:4;r");
        assert!(outcome.errors.is_empty());
        let score = outcome.score.expect("no errors means a score");
        assert_eq!(score.output.tracks.iter().count(), 1);
    }

    #[test]
    fn lex_errors_short_circuit_before_compiling() {
        let outcome = Score::compile_str(r#"d:"\xZZ""#);
        assert!(outcome.score.is_none());
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(outcome.errors[0], ScoreError::Lex(_)));
    }

    #[test]
    fn unresolved_group_jump_is_reported_as_a_link_error() {
        let outcome = Score::compile_str("g:9");
        assert!(outcome.score.is_none());
        assert!(matches!(outcome.errors[0], ScoreError::Link(_)));
    }

    #[test]
    fn custom_config_changes_default_step_ticks() {
        let mut config = Config::default();
        config.default_step_ticks = 48;
        let outcome = Score::compile_str_with_config("s:1", config);
        assert!(outcome.errors.is_empty());
    }
}

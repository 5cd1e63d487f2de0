//! A toolchain for a chiptune tracker score language.
//!
//! A score is plain text describing tracks, instruments, waveforms and
//! samples. This crate turns that text into a compact stream of 32-bit
//! instructions that drive a per-track virtual machine, whose side effects
//! in turn control a caller-supplied real-time synthesis engine.
//!
//! # Usage
//!
//! For most use cases, [`Score::compile_str`] takes a score from source text
//! to a linked, ready-to-run [`Score`] in one step:
//!
//! ```
//! use chiptune_score::Score;
//!
//! let source = "v:128;a:c4;s:4;r";
//! let outcome = Score::compile_str(source);
//! assert!(outcome.errors.is_empty());
//! let score = outcome.score.expect("no errors means a score");
//! assert_eq!(score.tracks.len(), 1);
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! bytes -> tokenize (push-model) -> parse (push-model) -> tree
//!       -> compile -> link -> context -> attach -> clock tick
//!       -> interpreter.advance() -> synth-engine mutations
//! ```
//!
//! Each stage lives in its own module: [`lex`], [`parse`], [`compile`],
//! [`interpret`], [`context`].
//!
//! # Features
//!
//! - `serde` enables [`serde::Serialize`]/[`serde::Deserialize`] on the
//!   public data model (tokens, tree nodes, instructions, compiled score).
//! - `diagnostics` (default) enables [`diagnostics::emit_score_diagnostics`],
//!   a rendered, source-snippet view of errors and warnings built on
//!   [`ariadne`].
//!
//! # Non-goals
//!
//! Audio DSP (oscillators, mixing), sample file codecs, a command-line
//! front end, and sound-device binding are out of scope. This crate only
//! specifies the contract a synthesis backend must implement
//! ([`context::SynthSink`], [`context::ClockSink`], [`context::SampleSource`]).

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod compile;
pub mod config;
pub mod context;
#[cfg(feature = "diagnostics")]
#[cfg_attr(docsrs, doc(cfg(feature = "diagnostics")))]
pub mod diagnostics;
pub mod error;
pub mod interpret;
pub mod lex;
pub mod parse;
mod score;
pub mod trace;

pub use config::Config;
pub use context::Context;
pub use error::{ScoreError, Warning};
pub use score::{CompileOutcome, Score};

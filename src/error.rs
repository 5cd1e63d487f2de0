//! Crate-wide error and warning types.
//!
//! Every fallible stage of the pipeline (see the crate root docs) returns a
//! [`thiserror::Error`] enum of its own; [`ScoreError`] unifies them so a
//! caller driving the whole pipeline through [`crate::Score::compile_str`]
//! has a single error type to match on.

use std::fmt;

/// A 1-based line/column pair identifying a position in source text.
///
/// Lines and columns both start at 1, matching the convention of every
/// diagnostic emitted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextPosition {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub col: usize,
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, col {}", self.line, self.col)
    }
}

/// Implemented by errors/warnings that can point at a position in the
/// original source, for use by [`crate::diagnostics`].
///
/// Every diagnostic in this crate carries a 1-based line/column
/// ([`TextPosition`]) rather than a byte offset (matching how the original
/// implementation reports positions); [`crate::diagnostics`] resolves a
/// `TextPosition` to a byte [`Range`] against the source text it is
/// rendering.
pub trait Spanned {
    /// Where in the source this diagnostic applies.
    fn position(&self) -> TextPosition;
}

/// Errors produced while tokenizing a score.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LexError {
    /// A byte outside the accepted source alphabet was encountered.
    #[error("unexpected character {found:?} at {position}")]
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// Where it was found.
        position: TextPosition,
    },
    /// A string or data literal was not closed before end of input.
    #[error("unterminated literal starting at {position}")]
    UnterminatedLiteral {
        /// Where the literal started.
        position: TextPosition,
    },
    /// A `\xHH` escape was not followed by exactly two hex digits.
    #[error("invalid hex escape at {position}: expected exactly two hex digits")]
    InvalidHexEscape {
        /// Where the escape started.
        position: TextPosition,
    },
    /// A `\` escape used an unrecognized letter.
    #[error("invalid escape sequence '\\{letter}' at {position}")]
    InvalidEscape {
        /// The letter following the backslash.
        letter: char,
        /// Where the escape started.
        position: TextPosition,
    },
    /// A base64 data literal contained a character outside the base64
    /// alphabet (and its `+`/`-`, `/`/`_` aliases).
    #[error("invalid base64 character {found:?} at {position}")]
    InvalidBase64 {
        /// The offending character.
        found: char,
        /// Where it was found.
        position: TextPosition,
    },
    /// The tokenizer was fed more input after it already entered the error
    /// state.
    #[error("tokenizer already in error state")]
    AlreadyErrored,
    /// The user-supplied `emit` callback reported an error of its own.
    #[error("emit callback aborted tokenization")]
    EmitAborted,
}

impl Spanned for LexError {
    fn position(&self) -> TextPosition {
        match self {
            Self::UnexpectedChar { position, .. }
            | Self::UnterminatedLiteral { position }
            | Self::InvalidHexEscape { position }
            | Self::InvalidEscape { position, .. }
            | Self::InvalidBase64 { position, .. } => *position,
            Self::AlreadyErrored | Self::EmitAborted => TextPosition { line: 1, col: 1 },
        }
    }
}

/// Non-fatal diagnostics produced while tokenizing.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LexWarning {
    /// A comment that was never terminated by a line break before EOF.
    #[error("unterminated comment at {position}")]
    UnterminatedComment {
        /// Where the comment started.
        position: TextPosition,
    },
}

/// Errors produced while parsing a token stream into a node tree.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// A `:` separator was not followed by an argument.
    #[error("expected argument after ':' at {position}")]
    ExpectedArgument {
        /// Where the separator was.
        position: TextPosition,
    },
    /// A `]` appeared with no matching open group, or at the root.
    #[error("unbalanced ']' at {position}")]
    UnbalancedGroupClose {
        /// Where the stray `]` was.
        position: TextPosition,
    },
    /// Input ended with one or more groups still open.
    #[error("unclosed group starting at {position}")]
    UnclosedGroup {
        /// Where the unmatched `[` was.
        position: TextPosition,
    },
    /// A token was rejected because the parser had already stopped.
    #[error("parser already in error state")]
    AlreadyErrored,
    /// A token of an unexpected type appeared for the current state.
    #[error("unexpected token at {position}: {message}")]
    UnexpectedToken {
        /// Human-readable description.
        message: String,
        /// Where it happened.
        position: TextPosition,
    },
}

impl Spanned for ParseError {
    fn position(&self) -> TextPosition {
        match self {
            Self::ExpectedArgument { position }
            | Self::UnbalancedGroupClose { position }
            | Self::UnclosedGroup { position }
            | Self::UnexpectedToken { position, .. } => *position,
            Self::AlreadyErrored => TextPosition { line: 1, col: 1 },
        }
    }
}

/// Errors produced while compiling a node tree into bytecode.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompileError {
    /// A command name has no entry in the command table.
    #[error("unexpected command '{name}' at {position}")]
    UnexpectedCommand {
        /// The unrecognized command or group name.
        name: String,
        /// Where it was written.
        position: TextPosition,
    },
    /// An instrument, waveform or sample name/explicit index was reused.
    #[error("'{name}' redefined at {new_position} (previously defined at {first_position})")]
    Redefined {
        /// The symbol's name.
        name: String,
        /// Where it was first defined.
        first_position: TextPosition,
        /// Where the conflicting redefinition occurred.
        new_position: TextPosition,
        /// Whether the collision was between two auto-assigned indices.
        same_autoindex: bool,
    },
    /// An instrument/waveform/sample/effect/pulse-kernel name could not be
    /// resolved.
    #[error("undefined {kind} '{name}' at {position}")]
    UndefinedSymbol {
        /// What kind of symbol was referenced (`"instrument"`, `"waveform"`, ...).
        kind: &'static str,
        /// The referenced name.
        name: String,
        /// Where it was referenced.
        position: TextPosition,
    },
    /// A track index was `>= MAX_TRACKS`.
    #[error("track index {index} out of range at {position} (maximum is {max})")]
    TrackIndexOutOfRange {
        /// The offending index.
        index: i64,
        /// The inclusive maximum allowed index.
        max: u32,
        /// Where it was written.
        position: TextPosition,
    },
    /// A group index was `>= MAX_GROUPS`.
    #[error("group index {index} out of range at {position} (maximum is {max})")]
    GroupIndexOutOfRange {
        /// The offending index.
        index: i64,
        /// The inclusive maximum allowed index.
        max: u32,
        /// Where it was written.
        position: TextPosition,
    },
    /// `dr` named a repeat mode other than `no`/`rep`/`pal`.
    #[error("invalid sample repeat mode '{mode}' at {position}")]
    InvalidSampleRepeat {
        /// The offending mode text.
        mode: String,
        /// Where it was written.
        position: TextPosition,
    },
    /// `ds`/`dn` described a range whose end precedes its start.
    #[error("invalid range {from}..{to} at {position}")]
    InvalidRange {
        /// Range start.
        from: i64,
        /// Range end.
        to: i64,
        /// Where it was written.
        position: TextPosition,
    },
    /// A value fell outside the domain its command documents.
    #[error("value {value} out of range for '{command}' at {position} (expected {expected})")]
    ValueOutOfRange {
        /// The command that rejected the value.
        command: &'static str,
        /// The offending value.
        value: i64,
        /// A human-readable description of the accepted domain.
        expected: &'static str,
        /// Where it was written.
        position: TextPosition,
    },
    /// A sequence used `<`/`>` more than once, or closed a repeat region
    /// that was never opened.
    #[error("malformed repeat-range brackets in sequence at {position}")]
    MalformedSequence {
        /// Where the sequence was written.
        position: TextPosition,
    },
    /// A command was written with fewer arguments than it requires.
    #[error("'{command}' at {position} expects {expected} argument(s)")]
    MissingArgument {
        /// The command name.
        command: String,
        /// How many arguments the command requires.
        expected: usize,
        /// Where it was written.
        position: TextPosition,
    },
}

impl Spanned for CompileError {
    fn position(&self) -> TextPosition {
        match self {
            Self::UnexpectedCommand { position, .. }
            | Self::UndefinedSymbol { position, .. }
            | Self::TrackIndexOutOfRange { position, .. }
            | Self::GroupIndexOutOfRange { position, .. }
            | Self::InvalidSampleRepeat { position, .. }
            | Self::InvalidRange { position, .. }
            | Self::ValueOutOfRange { position, .. }
            | Self::MalformedSequence { position }
            | Self::MissingArgument { position, .. } => *position,
            Self::Redefined { new_position, .. } => *new_position,
        }
    }
}

/// Errors produced while resolving group-jump targets after compilation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LinkError {
    /// A local group jump referenced a group index never defined on the
    /// issuing track.
    #[error("local group '{index}' not defined on line {}:{}", position.line, position.col)]
    LocalGroupUndefined {
        /// The referenced group index.
        index: u32,
        /// Where the call was written.
        position: TextPosition,
    },
    /// A global group jump referenced a group index never defined on the
    /// global track.
    #[error("global group '{index}' not defined on line {}:{}", position.line, position.col)]
    GlobalGroupUndefined {
        /// The referenced group index.
        index: u32,
        /// Where the call was written.
        position: TextPosition,
    },
    /// A cross-track group jump referenced a track or group that was never
    /// defined.
    #[error(
        "group '{group}' not defined on track '{track}' on line {}:{}", position.line, position.col
    )]
    TrackGroupUndefined {
        /// The referenced track index.
        track: u32,
        /// The referenced group index.
        group: u32,
        /// Where the call was written.
        position: TextPosition,
    },
}

impl Spanned for LinkError {
    fn position(&self) -> TextPosition {
        match self {
            Self::LocalGroupUndefined { position, .. }
            | Self::GlobalGroupUndefined { position, .. }
            | Self::TrackGroupUndefined { position, .. } => *position,
        }
    }
}

/// Errors produced while building or operating a [`crate::Context`].
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ContextError {
    /// A `samp load:wav` target could not be loaded by the caller-supplied
    /// [`crate::context::SampleSource`].
    #[error("failed to load sample '{name}' from '{path}': {message}")]
    SampleLoad {
        /// The sample's symbolic name.
        name: String,
        /// The path passed to `load:wav`.
        path: String,
        /// A human-readable description of the failure.
        message: String,
    },
}

/// The union of every error kind this crate can produce, returned by the
/// top-level [`crate::Score::compile_str`] convenience entry point.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ScoreError {
    /// See [`LexError`].
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    /// See [`ParseError`].
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// See [`CompileError`].
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    /// See [`LinkError`].
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    /// See [`ContextError`].
    #[error("context error: {0}")]
    Context(#[from] ContextError),
}

/// A non-fatal diagnostic collected during any pipeline stage.
///
/// Mirrors the teacher crate's pattern of collecting warnings in the output
/// struct of each stage rather than threading them through `Result`.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Warning {
    /// See [`LexWarning`].
    #[error("lex warning: {0}")]
    Lex(#[from] LexWarning),
}

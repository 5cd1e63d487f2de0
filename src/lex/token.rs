//! The token type produced by the [tokenizer](crate::lex).

use crate::error::TextPosition;

/// The payload of one lexical token.
///
/// `Space` and `Escape` from the original tokenizer's internal state
/// machine are not surfaced here: whitespace only ever acts as an argument
/// terminator, and escapes are resolved into the `String`/`Data` payload
/// they produced, so neither carries information the parser needs as a
/// token of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenKind {
    /// A bareword argument or command name, accumulated up to the next
    /// separator or whitespace.
    Arg(String),
    /// A `"..."` string literal with escapes already resolved.
    String(String),
    /// A `!"..."` base64 data literal, already decoded.
    Data(Vec<u8>),
    /// `:`
    ArgSep,
    /// `;`
    CmdSep,
    /// A line break, which terminates a command the same way `CmdSep`
    /// does.
    LineBreak,
    /// `[`
    GrpOpen,
    /// `]`
    GrpClose,
    /// A `%`-to-end-of-line comment, with the leading `%` stripped.
    Comment(String),
    /// End of input.
    End,
}

/// One lexical token together with the position of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    /// The token's payload.
    pub kind: TokenKind,
    /// Where the token starts in the source.
    pub position: TextPosition,
}

impl Token {
    pub(crate) const fn new(kind: TokenKind, position: TextPosition) -> Self {
        Self { kind, position }
    }

    /// Whether this token is a meaningful command/argument terminator
    /// (`CmdSep` or `LineBreak`), as opposed to an `ArgSep`.
    #[must_use]
    pub const fn is_command_separator(&self) -> bool {
        matches!(self.kind, TokenKind::CmdSep | TokenKind::LineBreak)
    }
}

//! Byte stream -> typed tokens with source offsets.
//!
//! [`Tokenizer`] is a push-model, streaming lexer: [`Tokenizer::put_chars`]
//! ingests a chunk of source text and invokes the caller's `emit` closure
//! with batches of up to 8 tokens, mirroring `BKTKTokenizerPutChars` in the
//! original implementation. [`tokenize`] is a convenience wrapper for
//! callers that already have the whole source in memory.

pub mod cursor;
pub mod token;

pub use token::{Token, TokenKind};

use cursor::Cursor;
use crate::error::{LexError, LexWarning, TextPosition};

const FLUSH_THRESHOLD: usize = 8;

#[derive(Debug, Clone)]
enum State {
    Root,
    /// Just saw `!`; waiting to see whether a `"` follows (data literal) or
    /// not (an ordinary argument starting with `!`).
    Bang,
    Arg,
    StringBody,
    StringEsc,
    /// Collecting the two hex digits of a `\xHH` escape.
    StringHex(String),
    CommentBody,
    DataBody,
    End,
    Error,
}

/// Streaming tokenizer.
///
/// Construct with [`Tokenizer::default`], feed chunks with
/// [`Tokenizer::put_chars`], and call [`Tokenizer::finish`] once the source
/// is exhausted.
#[derive(Debug)]
pub struct Tokenizer {
    state: State,
    cursor: Cursor,
    buffer: String,
    token_start: TextPosition,
    queue: Vec<Token>,
    error: Option<LexError>,
    warnings: Vec<LexWarning>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            state: State::Root,
            cursor: Cursor::new(),
            buffer: String::new(),
            token_start: TextPosition { line: 1, col: 1 },
            queue: Vec::with_capacity(FLUSH_THRESHOLD),
            error: None,
            warnings: Vec::new(),
        }
    }
}

/// Whether this character terminates a bareword `Arg`.
fn is_arg_terminator(ch: char) -> bool {
    matches!(ch, ':' | ';' | '[' | ']' | '%' | '"') || ch.is_whitespace()
}

impl Tokenizer {
    /// Whether the tokenizer has stopped accepting input (end of stream or
    /// error).
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self.state, State::End | State::Error)
    }

    /// Whether the tokenizer is in the terminal error state.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        matches!(self.state, State::Error)
    }

    /// Warnings accumulated so far (e.g. an unterminated trailing comment).
    #[must_use]
    pub fn warnings(&self) -> &[LexWarning] {
        &self.warnings
    }

    fn push(&mut self, kind: TokenKind, position: TextPosition) {
        self.queue.push(Token::new(kind, position));
    }

    fn flush(
        &mut self,
        emit: &mut dyn FnMut(&[Token]) -> Result<(), ()>,
    ) -> Result<(), LexError> {
        if self.queue.is_empty() {
            return Ok(());
        }
        let result = emit(&self.queue);
        self.queue.clear();
        result.map_err(|()| LexError::EmitAborted)
    }

    fn maybe_flush(
        &mut self,
        emit: &mut dyn FnMut(&[Token]) -> Result<(), ()>,
    ) -> Result<(), LexError> {
        if self.queue.len() >= FLUSH_THRESHOLD {
            self.flush(emit)?;
        }
        Ok(())
    }

    /// Feeds a chunk of source text to the tokenizer. Complete tokens are
    /// delivered to `emit` in batches; `emit` returning `Err(())` aborts
    /// tokenization with [`LexError::EmitAborted`].
    ///
    /// # Errors
    ///
    /// Returns an error if the source contains a lexical error, or if
    /// `emit` aborts.
    pub fn put_chars(
        &mut self,
        chars: &str,
        emit: &mut dyn FnMut(&[Token]) -> Result<(), ()>,
    ) -> Result<(), LexError> {
        if self.has_error() {
            return Err(LexError::AlreadyErrored);
        }
        for ch in chars.chars() {
            self.feed(ch)?;
            self.maybe_flush(emit)?;
        }
        self.flush(emit)
    }

    /// Signals end of input. Flushes any token still pending (e.g. an
    /// in-progress `Arg`) and emits a final [`TokenKind::End`].
    ///
    /// # Errors
    ///
    /// Returns an error if ending mid-literal (unterminated string/data
    /// literal), or if `emit` aborts.
    pub fn finish(
        &mut self,
        emit: &mut dyn FnMut(&[Token]) -> Result<(), ()>,
    ) -> Result<(), LexError> {
        let state = self.state.clone();
        match state {
            State::Arg => {
                let position = self.token_start;
                let text = std::mem::take(&mut self.buffer);
                self.push(TokenKind::Arg(text), position);
            }
            State::CommentBody => {
                let position = self.token_start;
                let text = std::mem::take(&mut self.buffer);
                self.warnings
                    .push(LexWarning::UnterminatedComment { position });
                self.push(TokenKind::Comment(text), position);
            }
            State::StringBody | State::StringEsc | State::StringHex(_) => {
                let position = self.token_start;
                self.state = State::Error;
                let err = LexError::UnterminatedLiteral { position };
                self.error = Some(err.clone());
                return Err(err);
            }
            State::Bang | State::DataBody => {
                let position = self.token_start;
                self.state = State::Error;
                let err = LexError::UnterminatedLiteral { position };
                self.error = Some(err.clone());
                return Err(err);
            }
            State::Root | State::End | State::Error => {}
        }
        self.state = State::End;
        self.push(TokenKind::End, self.cursor.position());
        self.flush(emit)
    }

    fn fail(&mut self, err: LexError) -> Result<(), LexError> {
        self.state = State::Error;
        self.error = Some(err.clone());
        Err(err)
    }

    fn feed(&mut self, ch: char) -> Result<(), LexError> {
        let mut ch = ch;
        loop {
            match self.retry_feed(ch)? {
                Some(next) => ch = next,
                None => break,
            }
        }
        self.cursor.advance(ch);
        Ok(())
    }

    /// Processes one character in the current state. Returns `Some(ch)` if
    /// the same character must be reprocessed against a new state (e.g. an
    /// `Arg` terminator that is itself a meaningful token).
    fn retry_feed(&mut self, ch: char) -> Result<Option<char>, LexError> {
        let state = self.state.clone();
        match state {
            State::Root => {
                let pos = self.cursor.position();
                match ch {
                    ':' => self.push(TokenKind::ArgSep, pos),
                    ';' => self.push(TokenKind::CmdSep, pos),
                    '[' => self.push(TokenKind::GrpOpen, pos),
                    ']' => self.push(TokenKind::GrpClose, pos),
                    '\n' => self.push(TokenKind::LineBreak, pos),
                    '\r' => {}
                    '%' => {
                        self.token_start = pos;
                        self.buffer.clear();
                        self.state = State::CommentBody;
                    }
                    '"' => {
                        self.token_start = pos;
                        self.buffer.clear();
                        self.state = State::StringBody;
                    }
                    '!' => {
                        self.token_start = pos;
                        self.state = State::Bang;
                    }
                    c if c.is_whitespace() => {}
                    c => {
                        self.token_start = pos;
                        self.buffer.clear();
                        self.buffer.push(c);
                        self.state = State::Arg;
                    }
                }
                Ok(None)
            }
            State::Bang => {
                if ch == '"' {
                    self.buffer.clear();
                    self.state = State::DataBody;
                    Ok(None)
                } else {
                    self.buffer.clear();
                    self.buffer.push('!');
                    self.state = State::Arg;
                    Ok(Some(ch))
                }
            }
            State::Arg => {
                if is_arg_terminator(ch) || ch == '\n' {
                    let position = self.token_start;
                    let text = std::mem::take(&mut self.buffer);
                    self.push(TokenKind::Arg(text), position);
                    self.state = State::Root;
                    Ok(Some(ch))
                } else {
                    self.buffer.push(ch);
                    Ok(None)
                }
            }
            State::StringBody => {
                match ch {
                    '"' => {
                        let position = self.token_start;
                        let text = std::mem::take(&mut self.buffer);
                        self.push(TokenKind::String(text), position);
                        self.state = State::Root;
                    }
                    '\\' => self.state = State::StringEsc,
                    c => self.buffer.push(c),
                }
                Ok(None)
            }
            State::StringEsc => {
                match ch {
                    'a' => self.buffer.push('\u{07}'),
                    'b' => self.buffer.push('\u{08}'),
                    'f' => self.buffer.push('\u{0C}'),
                    'n' => self.buffer.push('\n'),
                    'r' => self.buffer.push('\r'),
                    't' => self.buffer.push('\t'),
                    'v' => self.buffer.push('\u{0B}'),
                    'x' => {
                        self.state = State::StringHex(String::new());
                        return Ok(None);
                    }
                    c => self.buffer.push(c),
                }
                self.state = State::StringBody;
                Ok(None)
            }
            State::StringHex(mut digits) => {
                if ch.is_ascii_hexdigit() {
                    digits.push(ch);
                    if digits.len() == 2 {
                        let byte = u8::from_str_radix(&digits, 16)
                            .expect("validated hex digits parse");
                        self.buffer.push(byte as char);
                        self.state = State::StringBody;
                    } else {
                        self.state = State::StringHex(digits);
                    }
                    Ok(None)
                } else {
                    let position = self.token_start;
                    self.fail(LexError::InvalidHexEscape { position })?;
                    unreachable!("fail always returns Err")
                }
            }
            State::CommentBody => {
                if ch == '\n' {
                    let position = self.token_start;
                    let text = std::mem::take(&mut self.buffer);
                    self.push(TokenKind::Comment(text), position);
                    self.state = State::Root;
                    Ok(Some(ch))
                } else if ch == '\r' {
                    Ok(None)
                } else {
                    self.buffer.push(ch);
                    Ok(None)
                }
            }
            State::DataBody => {
                if ch == '"' {
                    let position = self.token_start;
                    let raw = std::mem::take(&mut self.buffer);
                    let data = decode_base64_lenient(&raw, position)?;
                    self.push(TokenKind::Data(data), position);
                    self.state = State::Root;
                } else {
                    self.buffer.push(ch);
                }
                Ok(None)
            }
            State::End | State::Error => Ok(None),
        }
    }
}

/// Decodes a base64 literal, tolerating `-`/`_` as aliases for `+`/`/`,
/// ignoring `=` padding, and recovering trailing bytes when the input
/// length is not a multiple of 4 (see `SPEC_FULL.md` §8 boundary behaviors).
fn decode_base64_lenient(input: &str, position: TextPosition) -> Result<Vec<u8>, LexError> {
    let mut bits: u32 = 0;
    let mut nbits: u32 = 0;
    let mut out = Vec::with_capacity(input.len() * 3 / 4 + 1);
    for ch in input.chars() {
        if ch == '=' {
            continue;
        }
        let value = base64_value(ch).ok_or(LexError::InvalidBase64 {
            found: ch,
            position,
        })?;
        bits = (bits << 6) | u32::from(value);
        nbits += 6;
        if nbits >= 8 {
            nbits -= 8;
            out.push((bits >> nbits) as u8);
        }
    }
    Ok(out)
}

const fn base64_value(ch: char) -> Option<u8> {
    match ch {
        'A'..='Z' => Some(ch as u8 - b'A'),
        'a'..='z' => Some(ch as u8 - b'a' + 26),
        '0'..='9' => Some(ch as u8 - b'0' + 52),
        '+' | '-' => Some(62),
        '/' | '_' => Some(63),
        _ => None,
    }
}

/// Output of a non-streaming [`tokenize`] call.
#[derive(Debug, Clone, Default)]
pub struct LexOutput {
    /// All tokens produced, including the trailing [`TokenKind::End`].
    pub tokens: Vec<Token>,
    /// Non-fatal diagnostics.
    pub warnings: Vec<LexWarning>,
}

/// Tokenizes an entire source string in one step. Prefer [`Tokenizer`]
/// directly when the source arrives incrementally.
///
/// # Errors
///
/// Returns an error at the first lexical error encountered.
pub fn tokenize(source: &str) -> Result<LexOutput, LexError> {
    let mut tokenizer = Tokenizer::default();
    let mut tokens = Vec::new();
    let mut emit = |batch: &[Token]| -> Result<(), ()> {
        tokens.extend_from_slice(batch);
        Ok(())
    };
    tokenizer.put_chars(source, &mut emit)?;
    tokenizer.finish(&mut emit)?;
    Ok(LexOutput {
        tokens,
        warnings: tokenizer.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenize should succeed")
            .tokens
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn simple_command() {
        assert_eq!(
            kinds("v:128;a:c4"),
            vec![
                TokenKind::Arg("v".into()),
                TokenKind::ArgSep,
                TokenKind::Arg("128".into()),
                TokenKind::CmdSep,
                TokenKind::Arg("a".into()),
                TokenKind::ArgSep,
                TokenKind::Arg("c4".into()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn string_with_escapes() {
        assert_eq!(
            kinds(r#"d:"kick\n\x41""#),
            vec![
                TokenKind::Arg("d".into()),
                TokenKind::ArgSep,
                TokenKind::String("kick\nA".into()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn invalid_hex_escape_errors() {
        let err = tokenize(r#""\xZZ""#).unwrap_err();
        assert!(matches!(err, LexError::InvalidHexEscape { .. }));
    }

    #[test]
    fn base64_data_literal_with_aliases() {
        // "AB" is 12 bits; only one full byte is recoverable (trailing
        // 4 bits discarded), matching the length-mod-4==2 boundary case.
        let out = tokenize(r#"!"AB""#).expect("tokenize should succeed");
        assert_eq!(out.tokens[0].kind, TokenKind::Data(vec![0x00]));
    }

    #[test]
    fn base64_data_literal_three_chars() {
        // "QQE" is 18 bits -> 2 recovered bytes (length mod 4 == 3).
        let out = tokenize(r#"!"QQE""#).expect("tokenize should succeed");
        if let TokenKind::Data(bytes) = &out.tokens[0].kind {
            assert_eq!(bytes.len(), 2);
        } else {
            panic!("expected a Data token");
        }
    }

    #[test]
    fn group_brackets_and_comment() {
        assert_eq!(
            kinds("[grp 0 % note\n]"),
            vec![
                TokenKind::GrpOpen,
                TokenKind::Arg("grp".into()),
                TokenKind::Arg("0".into()),
                TokenKind::Comment(" note".into()),
                TokenKind::LineBreak,
                TokenKind::GrpClose,
                TokenKind::End,
            ]
        );
    }
}

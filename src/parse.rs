//! Token stream -> tree of command nodes.
//!
//! [`Parser`] is a push-model consumer of [`Token`]s, mirroring
//! `BKTKParserPutTokens` in the original implementation: it owns a stack of
//! in-progress groups, and commands finalize into whichever group is
//! currently open. [`parse`] is a convenience wrapper for callers that
//! already have the whole token stream in memory.

pub mod model;
pub mod write;

pub use model::{Arg, ArgValue, Node, NodeKind};
pub use write::write_tree;

use crate::error::{ParseError, TextPosition};
use crate::lex::{Token, TokenKind};

struct Frame {
    name: Option<String>,
    args: Vec<Arg>,
    children: Vec<Node>,
    position: TextPosition,
}

impl Frame {
    const fn new(position: TextPosition) -> Self {
        Self {
            name: None,
            args: Vec::new(),
            children: Vec::new(),
            position,
        }
    }

    fn has_command_in_progress(&self) -> bool {
        self.name.is_some()
    }

    /// Finalizes whatever command is in progress on this frame (if any)
    /// into a `Command` child, clearing the in-progress state.
    fn finalize_command(&mut self) {
        if let Some(name) = self.name.take() {
            let args = std::mem::take(&mut self.args);
            self.children.push(Node {
                kind: NodeKind::Command { name, args },
                position: self.position,
            });
        }
    }
}

/// Push-model parser.
///
/// Construct with [`Parser::default`], feed token batches with
/// [`Parser::put_tokens`], and read the finished tree with
/// [`Parser::node_tree`] once [`Parser::is_finished`] is `true`.
#[derive(Default)]
pub struct Parser {
    stack: Vec<Frame>,
    expecting_arg: bool,
    finished: bool,
    errored: bool,
    tree: Option<Node>,
}

impl Parser {
    /// Whether the parser has stopped accepting tokens (finished or
    /// errored).
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished || self.errored
    }

    /// Whether the parser is in the terminal error state.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.errored
    }

    /// The finished node tree, once parsing has completed without error.
    #[must_use]
    pub fn node_tree(&self) -> Option<&Node> {
        self.tree.as_ref()
    }

    fn top(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("root frame is never popped")
    }

    fn fail(&mut self, err: ParseError) -> Result<(), ParseError> {
        self.errored = true;
        Err(err)
    }

    /// Feeds a batch of tokens to the parser.
    ///
    /// # Errors
    ///
    /// Returns an error at the first syntactic error encountered; once
    /// returned, the parser accepts no further tokens.
    pub fn put_tokens(&mut self, tokens: &[Token]) -> Result<(), ParseError> {
        if self.stack.is_empty() {
            self.stack.push(Frame::new(TextPosition { line: 1, col: 1 }));
        }
        for token in tokens {
            if self.errored {
                return self.fail(ParseError::AlreadyErrored);
            }
            self.put_token(token)?;
        }
        Ok(())
    }

    fn put_token(&mut self, token: &Token) -> Result<(), ParseError> {
        match &token.kind {
            TokenKind::Arg(_) | TokenKind::String(_) | TokenKind::Data(_) => {
                self.put_value(token)?;
            }
            TokenKind::ArgSep => {
                let top = self.top();
                if !top.has_command_in_progress() {
                    return self.fail(ParseError::UnexpectedToken {
                        message: "':' with no preceding command name".into(),
                        position: token.position,
                    });
                }
                if self.expecting_arg {
                    return self.fail(ParseError::ExpectedArgument {
                        position: token.position,
                    });
                }
                self.expecting_arg = true;
            }
            TokenKind::CmdSep | TokenKind::LineBreak => {
                if self.expecting_arg {
                    return self.fail(ParseError::ExpectedArgument {
                        position: token.position,
                    });
                }
                self.top().finalize_command();
            }
            TokenKind::GrpOpen => {
                if self.expecting_arg {
                    return self.fail(ParseError::ExpectedArgument {
                        position: token.position,
                    });
                }
                self.top().finalize_command();
                self.stack.push(Frame::new(token.position));
            }
            TokenKind::GrpClose => {
                self.close_group(token.position)?;
            }
            TokenKind::Comment(text) => {
                if self.expecting_arg {
                    return self.fail(ParseError::ExpectedArgument {
                        position: token.position,
                    });
                }
                self.top().finalize_command();
                self.top().children.push(Node {
                    kind: NodeKind::Comment(text.clone()),
                    position: token.position,
                });
            }
            TokenKind::End => {
                self.finish(token.position)?;
            }
        }
        Ok(())
    }

    fn put_value(&mut self, token: &Token) -> Result<(), ParseError> {
        let arg = Arg::from_token(&token.kind, token.position).expect("value token");
        let top = self.top();
        if top.has_command_in_progress() {
            if !self.expecting_arg {
                return self.fail(ParseError::UnexpectedToken {
                    message: "two values with no separator between them".into(),
                    position: token.position,
                });
            }
            top.args.push(arg);
            self.expecting_arg = false;
        } else {
            let name = arg.as_text().map(str::to_owned).unwrap_or_default();
            top.name = Some(name);
            top.position = token.position;
        }
        Ok(())
    }

    fn close_group(&mut self, position: TextPosition) -> Result<(), ParseError> {
        if self.expecting_arg {
            return self.fail(ParseError::ExpectedArgument { position });
        }
        self.top().finalize_command();
        if self.stack.len() <= 1 {
            return self.fail(ParseError::UnbalancedGroupClose { position });
        }
        let frame = self.stack.pop().expect("checked above");
        let mut children = frame.children;
        if children.is_empty() {
            return self.fail(ParseError::UnexpectedToken {
                message: "empty group has no head command".into(),
                position: frame.position,
            });
        }
        let head = children.remove(0);
        let (name, args) = match head.kind {
            NodeKind::Command { name, args } => (name, args),
            NodeKind::Group { .. } | NodeKind::Comment(_) => {
                return self.fail(ParseError::UnexpectedToken {
                    message: "group's first entry must be a plain command".into(),
                    position: head.position,
                });
            }
        };
        self.top().children.push(Node {
            kind: NodeKind::Group {
                name,
                args,
                children,
            },
            position: frame.position,
        });
        Ok(())
    }

    fn finish(&mut self, position: TextPosition) -> Result<(), ParseError> {
        if self.expecting_arg {
            return self.fail(ParseError::ExpectedArgument { position });
        }
        self.top().finalize_command();
        if self.stack.len() > 1 {
            let unclosed = self.stack.last().expect("len > 1").position;
            return self.fail(ParseError::UnclosedGroup { position: unclosed });
        }
        let root = self.stack.pop().expect("root frame present");
        self.tree = Some(Node {
            kind: NodeKind::Group {
                name: String::new(),
                args: Vec::new(),
                children: root.children,
            },
            position: TextPosition { line: 1, col: 1 },
        });
        self.finished = true;
        Ok(())
    }
}

/// Output of a non-streaming [`parse`] call.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    /// The root node, an unnamed [`NodeKind::Group`] whose children are the
    /// top-level commands and groups.
    pub tree: Node,
}

/// Parses an entire token stream (including its trailing
/// [`crate::lex::TokenKind::End`]) in one step.
///
/// # Errors
///
/// Returns an error at the first syntactic error encountered.
pub fn parse(tokens: &[Token]) -> Result<ParseOutput, ParseError> {
    let mut parser = Parser::default();
    parser.put_tokens(tokens)?;
    let tree = parser
        .node_tree()
        .cloned()
        .expect("End token present means parsing finished");
    Ok(ParseOutput { tree })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenize;

    fn parse_source(source: &str) -> Node {
        let lex = tokenize(source).expect("tokenize should succeed");
        parse(&lex.tokens).expect("parse should succeed").tree
    }

    #[test]
    fn flat_commands() {
        let tree = parse_source("v:128;a:c4");
        assert_eq!(tree.children().len(), 2);
        assert_eq!(tree.children()[0].name(), Some("v"));
        assert_eq!(tree.children()[1].name(), Some("a"));
    }

    #[test]
    fn group_folds_head_command() {
        let tree = parse_source("[grp:0; a:c4; s:1; x]");
        let group = &tree.children()[0];
        assert_eq!(group.name(), Some("grp"));
        assert_eq!(group.args().len(), 1);
        assert_eq!(group.children().len(), 3);
    }

    #[test]
    fn unbalanced_close_errors() {
        let lex = tokenize("v:1]").expect("tokenize should succeed");
        assert!(parse(&lex.tokens).is_err());
    }

    #[test]
    fn unclosed_group_errors() {
        let lex = tokenize("[grp:0; a:c4").expect("tokenize should succeed");
        assert!(parse(&lex.tokens).is_err());
    }

    #[test]
    fn comment_preserved_as_sibling() {
        let tree = parse_source("v:1 % hello\na:c4");
        assert_eq!(tree.children().len(), 3);
        assert!(matches!(tree.children()[1].kind, NodeKind::Comment(_)));
    }
}

//! The node tree produced by the [parser](crate::parse).

use crate::error::TextPosition;
use crate::lex::TokenKind;

/// One argument of a command: either plain/quoted text or a decoded data
/// literal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArgValue {
    /// A bareword or `"..."` string argument.
    Text(String),
    /// A `!"..."` base64 data literal, already decoded.
    Data(Vec<u8>),
}

/// One argument together with its source position and whether it was
/// written with quotes (needed to round-trip through [`crate::parse::write_tree`]).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Arg {
    /// The argument's value.
    pub value: ArgValue,
    /// Whether the source wrote this argument as a `"..."` string literal.
    pub quoted: bool,
    /// Where the argument starts in the source.
    pub position: TextPosition,
}

impl Arg {
    pub(crate) fn from_token(kind: &TokenKind, position: TextPosition) -> Option<Self> {
        match kind {
            TokenKind::Arg(text) => Some(Self {
                value: ArgValue::Text(text.clone()),
                quoted: false,
                position,
            }),
            TokenKind::String(text) => Some(Self {
                value: ArgValue::Text(text.clone()),
                quoted: true,
                position,
            }),
            TokenKind::Data(bytes) => Some(Self {
                value: ArgValue::Data(bytes.clone()),
                quoted: false,
                position,
            }),
            _ => None,
        }
    }

    /// The argument's text, if it is a `Text` value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ArgValue::Text(text) => Some(text),
            ArgValue::Data(_) => None,
        }
    }
}

/// One node of the parsed command tree.
///
/// Nodes form a tree: a [`NodeKind::Group`] node's `children` descend into
/// the group, the way `subNode` does in the original implementation; the
/// group's own `name`/`args` are folded in from what was written as the
/// first command inside the brackets (`[grp 0; ...]` names the group `grp`
/// with argument `0`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// The node's payload.
    pub kind: NodeKind,
    /// Where the node starts in the source.
    pub position: TextPosition,
}

/// The payload of one [`Node`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// A plain command: `name:arg:arg...`.
    Command {
        /// The command name.
        name: String,
        /// The command's arguments, in source order.
        args: Vec<Arg>,
    },
    /// A bracketed group: `[name:arg...; child; child...]`.
    Group {
        /// The name taken from the group's first child command.
        name: String,
        /// The arguments taken from the group's first child command.
        args: Vec<Arg>,
        /// The remaining children, in source order.
        children: Vec<Node>,
    },
    /// A `%`-to-end-of-line comment, preserved for round-tripping.
    Comment(String),
}

impl Node {
    /// The node's name, if it is a [`NodeKind::Command`] or [`NodeKind::Group`].
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Command { name, .. } | NodeKind::Group { name, .. } => Some(name),
            NodeKind::Comment(_) => None,
        }
    }

    /// The node's arguments, if it is a [`NodeKind::Command`] or [`NodeKind::Group`].
    #[must_use]
    pub fn args(&self) -> &[Arg] {
        match &self.kind {
            NodeKind::Command { args, .. } | NodeKind::Group { args, .. } => args,
            NodeKind::Comment(_) => &[],
        }
    }

    /// The node's children, if it is a [`NodeKind::Group`].
    #[must_use]
    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Group { children, .. } => children,
            NodeKind::Command { .. } | NodeKind::Comment(_) => &[],
        }
    }

    /// Whether this node is a [`NodeKind::Group`].
    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group { .. })
    }
}
